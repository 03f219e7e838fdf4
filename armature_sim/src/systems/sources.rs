use nalgebra::DVector;

/// A system with one vector output and no inputs.
pub trait VectorSource: Send {
    fn name(&self) -> &str;

    fn size(&self) -> usize;

    /// Output value at simulated `time`
    fn eval(&self, time: f64) -> DVector<f64>;
}

/// Emits the same vector at every time.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantVectorSource {
    name: String,
    value: DVector<f64>,
}

impl ConstantVectorSource {
    pub fn new(name: impl Into<String>, value: DVector<f64>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn zeros(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, DVector::zeros(size))
    }

    pub fn value(&self) -> &DVector<f64> {
        &self.value
    }
}

impl VectorSource for ConstantVectorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.value.len()
    }

    fn eval(&self, _time: f64) -> DVector<f64> {
        self.value.clone()
    }
}
