//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了不可变版本资源的写时复制变更。

pub mod operation;
pub mod plan;
pub mod request;

pub use operation::{ModifyLaunchTemplateDescription, ModifyLaunchTemplateOperation, MutationOutcome};
pub use plan::plan_mutation;
pub use request::{
    BlockDevice, ImageSelection, MarketChanges, MutationRequest, TemplateChanges, VersionSelector,
};
