// Kept alone in its own test binary: the Ctrl+C handler is process-wide.
use armature_core::{ArmatureError, NodeContext, NodeOptions};

#[test]
fn test_second_signal_handler_is_rejected() {
    let first = NodeContext::init(NodeOptions::new("signals")).unwrap();
    assert!(first.signals_enabled());
    assert!(first.ok());

    let second = NodeContext::init(NodeOptions::new("signals_again"));
    assert!(matches!(second, Err(ArmatureError::SignalHandler(_))));

    // A node without signal handling can still coexist.
    let quiet = NodeContext::init(NodeOptions::new("quiet").disable_signals(true)).unwrap();
    assert!(quiet.ok());
}
