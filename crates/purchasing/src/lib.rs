//! Purchasing domain module (event-sourced).
//!
//! Models the supplier order lifecycle from draft through partial or complete
//! receipt. Receiving emits the facts; the application layer turns each
//! receipt line into a stock-ledger adjustment.

pub mod order;

pub use order::{
    AddOrderLine, CancelOrder, CreatePurchaseOrder, DeleteOrder, GoodsReceived, LineReceipt,
    MarkOrdered, OrderCancelled, OrderDeleted, OrderDetailsUpdated, OrderLine, OrderLineAdded,
    OrderLineRemoved, OrderMarkedOrdered, OrderSubmitted, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderCreated, PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus, ReceiptLine,
    ReceiveGoods, RemoveOrderLine, SubmitOrder, UpdateOrderDetails,
};
