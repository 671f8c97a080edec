//! The ordered list of operation generators.

use log::trace;

use crate::algebra::Algebra;
use crate::error::{GenError, Result};
use crate::generators::*;
use crate::request::OperationRequest;

pub struct Catalog {
    generators: Vec<Box<dyn OperationGenerator>>,
}

impl Catalog {
    pub fn new(generators: Vec<Box<dyn OperationGenerator>>) -> Self {
        Catalog { generators }
    }

    /// Every generator family, in dispatch order.
    pub fn standard() -> Self {
        Catalog::new(vec![
            Box::new(AddSubtract),
            Box::new(Product),
            Box::new(InverseGeometricProduct),
            Box::new(Dual),
            Box::new(Norm),
            Box::new(Unit),
            Box::new(VersorInverse),
            Box::new(ApplyVersor),
            Box::new(SinCosExp),
            Box::new(Logarithm),
            Box::new(CgaPoint),
            Box::new(CgaPointDistance),
            Box::new(RandomScalar),
            Box::new(RandomValue),
            Box::new(RandomProduct),
            Box::new(Equals),
            Box::new(Zero),
            Box::new(GradeBitmap),
            Box::new(ExtractGrade),
            Box::new(ToggleSign),
            Box::new(Increment),
            Box::new(ScaleAddScalar),
            Box::new(ApplyOm),
            Box::new(Converter),
        ])
    }

    pub fn generators(&self) -> impl Iterator<Item = &dyn OperationGenerator> {
        self.generators.iter().map(|g| g.as_ref())
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// The first generator able to implement `request`.
    pub fn dispatch(&self, algebra: &Algebra, request: &OperationRequest) -> Result<&dyn OperationGenerator> {
        match self.generators().find(|g| g.can_implement(algebra, request)) {
            Some(g) => {
                trace!("{} handled by {}", request, g.name());
                Ok(g)
            }
            None => Err(GenError::Dispatch(request.to_string())),
        }
    }

    /// Names of all generators claiming `request`.
    pub fn claims(&self, algebra: &Algebra, request: &OperationRequest) -> Vec<&'static str> {
        self.generators()
            .filter(|g| g.can_implement(algebra, request))
            .map(|g| g.name())
            .collect()
    }
}
