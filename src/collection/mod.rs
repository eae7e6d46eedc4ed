mod policy;
mod provision;

pub use policy::{CollectionSpec, DataType, IncludedPath, IndexSpec, IndexUse, IndexingPolicy};
pub use provision::{CollectionProvisioner, ProvisionReport};
