pub mod concept;
pub mod decision;
pub mod opinion;
pub mod translation;
