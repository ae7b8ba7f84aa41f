//! Orders domain module.
//!
//! This crate contains the immutable `Order` model, the shape of the payload the
//! upstream order API returns (`RawOrder`), and the pure mapping between the
//! two. No IO, no HTTP, no storage.

pub mod extract;
pub mod mapping;
pub mod order;
pub mod raw;

pub use extract::{extract_order_number, extract_order_number_from_parts};
pub use mapping::{map_raw_order, normalize_email};
pub use order::{
    Address, Customer, FinancialStatus, FulfillmentStatus, LineItem, Money, Order, OrderId,
    OrderStatus, OrderTotals, ShippingInfo,
};
pub use raw::{RawAddress, RawCustomer, RawFulfillment, RawLineItem, RawOrder};
