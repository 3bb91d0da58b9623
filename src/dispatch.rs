use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::audio::PlaybackHandle;
use crate::config::BotConfig;
use crate::twitch::messages::RedemptionEvent;

const UNKNOWN_REDEEMER: &str = "someone";

/// Static mapping from a reward's display title to a playable audio file,
/// loaded from configuration. Titles match case-sensitively; an optional
/// system-wide fallback covers unmapped rewards.
pub struct RewardAudioMap {
    rewards: HashMap<String, PathBuf>,
    fallback: Option<PathBuf>,
}

impl RewardAudioMap {
    pub fn from_config(config: &BotConfig) -> Self {
        let rewards = config
            .reward_sounds
            .iter()
            .map(|(title, path)| (title.clone(), PathBuf::from(path)))
            .collect();
        let fallback = config
            .audio_paths
            .fallback_sound
            .as_ref()
            .map(PathBuf::from);
        Self { rewards, fallback }
    }

    fn resolve(&self, title: &str) -> Option<&Path> {
        self.rewards
            .get(title)
            .or(self.fallback.as_ref())
            .map(PathBuf::as_path)
    }
}

/// One redemption-log record per inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub title: String,
    pub user: String,
    pub audio_played: bool,
}

/// Turns redemption events into playback requests. Lookup and playback
/// failures are downgraded to `audio_played=false`; nothing raises past this
/// boundary.
pub struct EventDispatcher {
    rewards: RewardAudioMap,
    player: PlaybackHandle,
    volume: f32,
}

impl EventDispatcher {
    pub fn new(rewards: RewardAudioMap, player: PlaybackHandle, volume: f32) -> Self {
        Self {
            rewards,
            player,
            volume,
        }
    }

    pub fn dispatch(&self, event: &RedemptionEvent) -> DispatchRecord {
        let user = event
            .user_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_REDEEMER.to_string());
        let title = event.reward.title.clone();

        let audio_played = match self.rewards.resolve(&title) {
            Some(path) => {
                if path.exists() {
                    self.player.play_file(path.to_path_buf(), self.volume)
                } else {
                    log::warn!(
                        "Audio file for reward '{}' not found: {}",
                        title,
                        path.display()
                    );
                    false
                }
            }
            None => {
                log::warn!("No audio mapped for reward '{}'", title);
                false
            }
        };

        let record = DispatchRecord {
            title,
            user,
            audio_played,
        };
        log::info!(
            "Redemption: reward='{}' user='{}' audio_played={}",
            record.title,
            record.user,
            record.audio_played
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PlaybackSource;
    use crate::twitch::messages::Reward;
    use std::fs;

    fn temp_audio_file(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("dispatch_{}_{}.mp3", name, nanos));
        fs::write(&path, b"audio").unwrap();
        path
    }

    fn redemption(title: &str, user: Option<&str>) -> RedemptionEvent {
        RedemptionEvent {
            user_name: user.map(String::from),
            reward: Reward {
                title: title.to_string(),
            },
        }
    }

    fn map_with(rewards: Vec<(&str, PathBuf)>, fallback: Option<PathBuf>) -> RewardAudioMap {
        RewardAudioMap {
            rewards: rewards
                .into_iter()
                .map(|(title, path)| (title.to_string(), path))
                .collect(),
            fallback,
        }
    }

    #[test]
    fn test_mapped_reward_plays_exact_path() {
        let path = temp_audio_file("epic_horn");
        let (player, requests) = PlaybackHandle::test_pair();
        let dispatcher = EventDispatcher::new(
            map_with(vec![("Epic Horn", path.clone())], None),
            player,
            1.0,
        );

        let record = dispatcher.dispatch(&redemption("Epic Horn", Some("CoolUser")));
        assert_eq!(
            record,
            DispatchRecord {
                title: "Epic Horn".to_string(),
                user: "CoolUser".to_string(),
                audio_played: true,
            }
        );

        // exactly one playback invocation, with the mapped path
        let request = requests.try_recv().unwrap();
        match request.source {
            PlaybackSource::File(requested) => assert_eq!(requested, path),
            other => panic!("unexpected playback source: {:?}", other),
        }
        assert!(requests.try_recv().is_err());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_unmapped_reward_uses_fallback() {
        let fallback = temp_audio_file("fallback");
        let (player, requests) = PlaybackHandle::test_pair();
        let dispatcher =
            EventDispatcher::new(map_with(vec![], Some(fallback.clone())), player, 1.0);

        let record = dispatcher.dispatch(&redemption("Mystery Reward", Some("CoolUser")));
        assert!(record.audio_played);

        match requests.try_recv().unwrap().source {
            PlaybackSource::File(requested) => assert_eq!(requested, fallback),
            other => panic!("unexpected playback source: {:?}", other),
        }

        let _ = fs::remove_file(fallback);
    }

    #[test]
    fn test_unmapped_reward_without_fallback_reports_not_played() {
        let (player, requests) = PlaybackHandle::test_pair();
        let dispatcher = EventDispatcher::new(map_with(vec![], None), player, 1.0);

        let record = dispatcher.dispatch(&redemption("Mystery Reward", None));
        assert!(!record.audio_played);
        assert_eq!(record.user, UNKNOWN_REDEEMER);
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn test_missing_file_reports_not_played() {
        let (player, requests) = PlaybackHandle::test_pair();
        let dispatcher = EventDispatcher::new(
            map_with(
                vec![("Ghost Sound", PathBuf::from("files/definitely/missing.mp3"))],
                None,
            ),
            player,
            1.0,
        );

        let record = dispatcher.dispatch(&redemption("Ghost Sound", Some("CoolUser")));
        assert!(!record.audio_played);
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn test_title_match_is_case_sensitive() {
        let path = temp_audio_file("case");
        let (player, _requests) = PlaybackHandle::test_pair();
        let dispatcher =
            EventDispatcher::new(map_with(vec![("Epic Horn", path.clone())], None), player, 1.0);

        let record = dispatcher.dispatch(&redemption("epic horn", Some("CoolUser")));
        assert!(!record.audio_played);

        let _ = fs::remove_file(path);
    }
}
