pub mod check;
pub mod custom;
pub mod desc;

#[cfg(test)]
mod tests;

pub use custom::{CustomRef, CustomType, CustomTypes, SCALAR_TYPES, checked_serialize, valid_serialization};
pub use desc::TypeDesc;
