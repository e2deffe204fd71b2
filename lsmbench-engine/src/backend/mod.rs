pub mod fjall;
pub mod in_memory;
