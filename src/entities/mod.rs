pub mod customer;
pub mod product;
pub mod sales_transaction;
