pub mod action;
pub mod containers;
pub mod replay;
