pub mod expression;
pub mod operation;
pub mod order;
pub mod projection;
