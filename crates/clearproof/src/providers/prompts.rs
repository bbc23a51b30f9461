//! Prompt text sent to the vision provider.

/// Reply the OCR prompt asks for when an image holds no text.
pub const NO_TEXT_SENTINEL: &str = "NO_TEXT";

pub const OCR_SYSTEM: &str = "You are an OCR engine. You transcribe text exactly as it appears \
and never add commentary, descriptions, or formatting.";

pub const OCR_PROMPT: &str = "Transcribe all text visible in this image in natural reading order, \
one line per line of text. Output only the transcribed text. \
If the image contains no readable text, reply with exactly NO_TEXT.";

pub const THEMES_SYSTEM: &str = "You are a visual content analyst for a creative review platform. \
You answer with JSON only.";

pub const THEMES_PROMPT: &str = r#"Describe the visual themes of this image as JSON with these keys:
{
  "subjects": [main subjects or objects],
  "vibes": [mood or tone words],
  "notableElements": [distinctive design or composition elements],
  "colors": [dominant colors],
  "keywords": [other short search keywords]
}
Use 0-5 short lowercase entries (1-3 words) per key. Return ONLY the JSON object."#;
