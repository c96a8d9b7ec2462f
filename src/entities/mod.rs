//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod assistance_case;
pub mod credit;
pub mod due_type;
pub mod obligation;
pub mod payment;
pub mod payment_allocation;
pub mod payout;

// Re-export specific types to avoid conflicts
pub use assistance_case::{
    CaseStatus, Column as AssistanceCaseColumn, Entity as AssistanceCase,
    EventType, Model as AssistanceCaseModel,
};
pub use credit::{Column as CreditColumn, Entity as Credit, Model as CreditModel};
pub use due_type::{
    Column as DueTypeColumn, DueCategory, Entity as DueType, Model as DueTypeModel,
};
pub use obligation::{
    Column as ObligationColumn, Entity as Obligation, Model as ObligationModel,
};
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel, PaymentMethod};
pub use payment_allocation::{
    Column as PaymentAllocationColumn, Entity as PaymentAllocation,
    Model as PaymentAllocationModel,
};
pub use payout::{Column as PayoutColumn, Entity as Payout, Model as PayoutModel};
