pub mod intrusive_list;
pub mod lru_index;
pub mod slot_arena;

pub use intrusive_list::IntrusiveList;
pub use lru_index::LruIndex;
pub use slot_arena::{SlotArena, SlotId};
