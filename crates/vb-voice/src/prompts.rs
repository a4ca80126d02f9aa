//! Fixed model instructions

/// Instruction sent alongside the audio
pub const TRANSCRIPTION_PROMPT: &str =
    "Transcribe this voice message accurately. Preserve the conversational nature.";

/// Instruction prepended to the transcript
pub const SUMMARY_PROMPT: &str = "You are an expert meeting assistant. Your job is to summarize the following transcript for a busy executive.

ROLE: Meeting Summarizer
CONTEXT: The transcript is from a business meeting. Identify key points, action items, and overall sentiment.
TASK:
1. List Key Points (bulleted)
2. List Action Items (bulleted, with responsible person if possible)
3. Summarize Sentiment (one sentence)
CONSTRAINTS: Limit summary to 150 words. Use clear, professional language. Format as Markdown.";

/// Full summarization prompt for a transcript
pub fn summary_prompt(transcript: &str) -> String {
    format!("{}\n\nTRANSCRIPT:\n{}", SUMMARY_PROMPT, transcript)
}
