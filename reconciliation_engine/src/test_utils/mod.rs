mod memory_mailer;
pub mod prepare_env;

pub use memory_mailer::MemoryMailer;
