use std::time::Duration;
use urlencoding::encode;

use crate::twitch::error::{BotError, Result};

const TTS_LANGUAGE: &str = "en";
const MAX_TEXT_LENGTH: usize = 200;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch spoken audio for a chat message. Text beyond the length limit is
/// truncated rather than rejected.
pub async fn fetch_speech(text: &str) -> Result<Vec<u8>> {
    let trimmed: String = text.chars().take(MAX_TEXT_LENGTH).collect();
    let url = format!(
        "https://translate.google.com/translate_tts?ie=UTF-8&q={}&tl={}&client=tw-ob",
        encode(&trimmed),
        TTS_LANGUAGE
    );

    let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let response = client.get(&url).send().await?;

    if !response.status().is_success() {
        return Err(BotError::Transport(format!(
            "TTS fetch failed: HTTP {}",
            response.status()
        )));
    }

    let bytes = response.bytes().await?;
    log::info!("Fetched TTS audio ({} bytes)", bytes.len());
    Ok(bytes.to_vec())
}
