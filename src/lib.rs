// Modules shared by the desktop window and the command line front-end
pub mod config;
pub mod types {
    pub mod llm_data;
}
pub mod parsing;
pub mod prompts;
pub mod llm;
pub mod session;
pub mod render;
pub mod app;
