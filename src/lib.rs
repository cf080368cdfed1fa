//! Gemini chatbot backend: authenticated conversations, prompt assembly from
//! recent history, blocking and streamed replies, and DuckDB-backed storage.

pub mod api;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod config;
pub mod db;
pub mod llm;
