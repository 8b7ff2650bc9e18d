/// OpenAI-compatible vision model.
pub mod openai;
