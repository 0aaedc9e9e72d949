// Domain-layer modules: extraction, targets, training and inference
pub mod features {
    pub use crate::features::*;
}

pub mod scoring {
    pub use crate::scoring::*;
}

pub mod training {
    pub use crate::dataset::*;
    pub use crate::gbdt::*;
    pub use crate::metrics::*;
}

pub mod errors {
    pub use crate::errors::*;
}
