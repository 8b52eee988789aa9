pub mod availability;
pub mod config;
pub mod entities;
pub mod intent;
pub mod models;
pub mod planner;
pub mod timeframe;

pub use availability::{
    check_conflicts, find_available_slots, mock_workday, parse_busy_blocks, parse_busy_spec,
    BusyBlock, Conflict, SlotOption, WorkingHours,
};
pub use config::PipelineConfig;
pub use entities::{extract_entities, normalize_entity_value};
pub use intent::{classify_intent_rules, normalize_text, RuleMatch};
pub use models::*;
pub use planner::build_action_plan;
pub use timeframe::{resolve_timeframe, DateWindow};
