use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::audio::PlaybackHandle;
use crate::catalog::AudioCatalog;
use crate::points::{DebitOutcome, PointsStore};
use crate::tts;
use crate::twitch::messages::ChatMessageEvent;

pub const TTS_COST: i64 = 200;
/// Twitch caps chat messages at 500 characters; leave headroom
const CHAT_MESSAGE_LIMIT: usize = 450;

/// Outbound chat seam. The production implementation posts through Helix;
/// tests record the replies instead.
#[allow(async_fn_in_trait)]
pub trait ChatSender {
    async fn send(&self, text: String);
}

/// Result of a play request, driving the chat reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Played { name: String, remaining: i64 },
    InsufficientPoints { cost: i64, balance: i64 },
    NotFound,
}

/// Routes prefixed chat messages to command handlers. Holds shared references
/// to the stores it mutates; playback itself is fire-and-forget.
pub struct CommandRouter<S: ChatSender> {
    prefix: String,
    sender: S,
    points: Arc<Mutex<PointsStore>>,
    catalog: Arc<RwLock<AudioCatalog>>,
    player: PlaybackHandle,
    volume: f32,
    audio_root: PathBuf,
}

impl<S: ChatSender> CommandRouter<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prefix: String,
        sender: S,
        points: Arc<Mutex<PointsStore>>,
        catalog: Arc<RwLock<AudioCatalog>>,
        player: PlaybackHandle,
        volume: f32,
        audio_root: PathBuf,
    ) -> Self {
        Self {
            prefix,
            sender,
            points,
            catalog,
            player,
            volume,
            audio_root,
        }
    }

    pub async fn handle(&self, event: &ChatMessageEvent) {
        let text = event.message.text.trim();
        let Some(rest) = text.strip_prefix(&self.prefix) else {
            log::info!("[chat] {}: {}", event.chatter_user_name, text);
            return;
        };
        log::info!("[command] {}: {}", event.chatter_user_name, text);

        let rest = rest.trim_start();
        let Some(command) = rest.split_whitespace().next() else {
            return;
        };
        let remainder = rest[command.len()..].trim();
        let args: Vec<&str> = remainder.split_whitespace().collect();

        match command.to_lowercase().as_str() {
            "ping" => {
                self.sender
                    .send(format!("Pong, {}!", event.chatter_user_name))
                    .await
            }
            "points" | "pts" => self.cmd_points(event).await,
            "p" | "play" => self.cmd_play(event, &args).await,
            "sounds" | "audios" => self.cmd_sounds().await,
            "addpoints" | "give" => self.cmd_addpoints(event, &args).await,
            "tts" => self.cmd_tts(event, remainder).await,
            "stop" => {
                self.player.stop();
                self.sender.send("Playback stopped!".to_string()).await;
            }
            "reload" => self.cmd_reload().await,
            "status" => self.cmd_status().await,
            "help" | "commands" => self.cmd_help(event).await,
            _ => {}
        }
    }

    /// Look up the clip, debit its cost, and fire playback. Exposed so the
    /// outcome can be inspected without a chat round trip.
    pub async fn try_play(&self, user: &str, name: &str) -> PlayOutcome {
        let name = name.to_lowercase();
        let clip = { self.catalog.read().await.get(&name).cloned() };
        let Some(clip) = clip else {
            return PlayOutcome::NotFound;
        };

        match self.points.lock().await.debit(user, clip.cost) {
            DebitOutcome::Debited { remaining } => {
                self.player.play_file(clip.path, self.volume);
                PlayOutcome::Played { name, remaining }
            }
            DebitOutcome::InsufficientBalance { balance } => PlayOutcome::InsufficientPoints {
                cost: clip.cost,
                balance,
            },
        }
    }

    async fn cmd_points(&self, event: &ChatMessageEvent) {
        let balance = self.points.lock().await.balance(&event.chatter_user_login);
        self.sender
            .send(format!(
                "{}, you have {} points.",
                event.chatter_user_name, balance
            ))
            .await;
    }

    async fn cmd_play(&self, event: &ChatMessageEvent, args: &[&str]) {
        let Some(name) = args.first() else {
            self.sender
                .send(format!("Usage: {}p <name>", self.prefix))
                .await;
            return;
        };

        match self.try_play(&event.chatter_user_login, name).await {
            PlayOutcome::Played { name, remaining } => {
                self.sender
                    .send(format!("Playing: {}. Balance: {} pts.", name, remaining))
                    .await;
            }
            PlayOutcome::InsufficientPoints { cost, balance } => {
                self.sender
                    .send(format!(
                        "Insufficient points! That costs {} pts and you have {}.",
                        cost, balance
                    ))
                    .await;
            }
            PlayOutcome::NotFound => {
                self.sender
                    .send(format!("Audio '{}' not found.", name.to_lowercase()))
                    .await;
            }
        }
    }

    async fn cmd_sounds(&self) {
        let grouped = self.catalog.read().await.by_cost();
        if grouped.is_empty() {
            self.sender
                .send("No audio files found.".to_string())
                .await;
            return;
        }

        let parts: Vec<String> = grouped
            .iter()
            .map(|(cost, names)| format!("[{} pts: {}]", cost, names.join(", ")))
            .collect();
        let mut message = format!("Available sounds: {}", parts.join(" | "));
        if message.len() > CHAT_MESSAGE_LIMIT {
            let mut cut = CHAT_MESSAGE_LIMIT - 3;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
            message.push_str("...");
        }
        self.sender.send(message).await;
    }

    async fn cmd_addpoints(&self, event: &ChatMessageEvent, args: &[&str]) {
        if !event.is_moderator() {
            log::warn!(
                "{} tried to use addpoints without permission",
                event.chatter_user_name
            );
            return;
        }

        let (Some(user), Some(amount)) = (args.first(), args.get(1)) else {
            self.sender
                .send(format!("Usage: {}addpoints <@user> <amount>", self.prefix))
                .await;
            return;
        };
        let Ok(amount) = amount.parse::<i64>() else {
            self.sender
                .send(format!("Usage: {}addpoints <@user> <amount>", self.prefix))
                .await;
            return;
        };

        let target = user.trim_start_matches('@').to_lowercase();
        let new_balance = {
            let mut store = self.points.lock().await;
            store.credit(&target, amount);
            store.balance(&target)
        };
        log::info!(
            "{} gave {} points to {}",
            event.chatter_user_name,
            amount,
            target
        );
        self.sender
            .send(format!(
                "{} points added to {}! Balance: {} pts.",
                amount, target, new_balance
            ))
            .await;
    }

    async fn cmd_tts(&self, event: &ChatMessageEvent, text: &str) {
        if text.is_empty() {
            self.sender
                .send(format!("Usage: {}tts <message>", self.prefix))
                .await;
            return;
        }

        let outcome = self
            .points
            .lock()
            .await
            .debit(&event.chatter_user_login, TTS_COST);
        match outcome {
            DebitOutcome::Debited { .. } => {
                let spoken = format!("{} sent the message: {}", event.chatter_user_name, text);
                match tts::fetch_speech(&spoken).await {
                    Ok(bytes) => {
                        self.player.play_bytes(bytes, self.volume);
                        self.sender
                            .send(format!(
                                "[TTS] {} sent a message! (-{} pts)",
                                event.chatter_user_name, TTS_COST
                            ))
                            .await;
                    }
                    Err(e) => {
                        log::error!("TTS error: {}", e);
                        self.sender
                            .send("Failed to generate TTS.".to_string())
                            .await;
                    }
                }
            }
            DebitOutcome::InsufficientBalance { .. } => {
                self.sender
                    .send(format!("Insufficient points ({} pts required).", TTS_COST))
                    .await;
            }
        }
    }

    async fn cmd_reload(&self) {
        let rebuilt = AudioCatalog::scan(&self.audio_root);
        let count = rebuilt.len();
        *self.catalog.write().await = rebuilt;
        self.sender
            .send(format!("Reloaded! {} sounds indexed.", count))
            .await;
    }

    async fn cmd_status(&self) {
        let count = self.catalog.read().await.len();
        self.sender
            .send(format!(
                "[STATUS] Bot is online! {} sounds loaded. Points system active.",
                count
            ))
            .await;
    }

    async fn cmd_help(&self, event: &ChatMessageEvent) {
        let p = &self.prefix;
        let mut commands = vec![
            format!("{}points", p),
            format!("{}p <name>", p),
            format!("{}tts <msg>", p),
            format!("{}sounds", p),
            format!("{}stop", p),
            format!("{}status", p),
            format!("{}ping", p),
        ];
        if event.is_moderator() {
            commands.push(format!("{}addpoints <@user> <amount>", p));
            commands.push(format!("{}reload", p));
        }
        self.sender
            .send(format!("Available commands: {}", commands.join(", ")))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PlaybackSource;
    use crate::twitch::messages::{Badge, ChatText};
    use std::fs;
    use std::sync::mpsc::Receiver;

    #[derive(Clone, Default)]
    struct RecordingSender(Arc<std::sync::Mutex<Vec<String>>>);

    impl ChatSender for RecordingSender {
        async fn send(&self, text: String) {
            self.0.lock().unwrap().push(text);
        }
    }

    impl RecordingSender {
        fn replies(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn chat(user: &str, text: &str, moderator: bool) -> ChatMessageEvent {
        let badges = if moderator {
            vec![Badge {
                set_id: "moderator".to_string(),
                id: "1".to_string(),
                info: String::new(),
            }]
        } else {
            vec![]
        };
        ChatMessageEvent {
            chatter_user_id: "42".to_string(),
            chatter_user_login: user.to_lowercase(),
            chatter_user_name: user.to_string(),
            message: ChatText {
                text: text.to_string(),
            },
            badges,
        }
    }

    struct Fixture {
        router: CommandRouter<RecordingSender>,
        sender: RecordingSender,
        playback: Receiver<crate::audio::PlaybackRequest>,
        root: PathBuf,
    }

    /// Router over a real on-disk catalog root (files/<cost>/<name>.mp3)
    fn fixture(name: &str, clips: &[(&str, &str)], balances: &[(&str, i64)]) -> Fixture {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = std::env::temp_dir().join(format!("commands_{}_{}", name, nanos));
        for (cost, file) in clips {
            let tier = root.join(cost);
            fs::create_dir_all(&tier).unwrap();
            fs::write(tier.join(file), b"audio").unwrap();
        }

        let mut store = PointsStore::load(root.join("points.json"));
        for (user, amount) in balances {
            store.credit(user, *amount);
        }

        let sender = RecordingSender::default();
        let (player, playback) = PlaybackHandle::test_pair();
        let router = CommandRouter::new(
            "!".to_string(),
            sender.clone(),
            Arc::new(Mutex::new(store)),
            Arc::new(RwLock::new(AudioCatalog::scan(&root))),
            player,
            1.0,
            root.clone(),
        );

        Fixture {
            router,
            sender,
            playback,
            root,
        }
    }

    #[tokio::test]
    async fn test_play_deducts_cost_then_rejects_when_broke() {
        let fx = fixture("play_flow", &[("50", "oof.mp3")], &[("someuser", 60)]);

        // balance 60: the 50-point clip plays and leaves 10
        let outcome = fx.router.try_play("someuser", "oof").await;
        assert_eq!(
            outcome,
            PlayOutcome::Played {
                name: "oof".to_string(),
                remaining: 10
            }
        );
        let request = fx.playback.try_recv().unwrap();
        match request.source {
            PlaybackSource::File(path) => {
                assert_eq!(path, fx.root.join("50").join("oof.mp3"))
            }
            other => panic!("unexpected playback source: {:?}", other),
        }

        // balance 10: rejected, nothing deducted, nothing played
        let outcome = fx.router.try_play("someuser", "oof").await;
        assert_eq!(
            outcome,
            PlayOutcome::InsufficientPoints {
                cost: 50,
                balance: 10
            }
        );
        assert_eq!(fx.router.points.lock().await.balance("someuser"), 10);
        assert!(fx.playback.try_recv().is_err());

        let _ = fs::remove_dir_all(fx.root);
    }

    #[tokio::test]
    async fn test_play_command_replies_with_balance() {
        let fx = fixture("play_reply", &[("50", "oof.mp3")], &[("someuser", 60)]);

        fx.router.handle(&chat("SomeUser", "!p oof", false)).await;
        fx.router.handle(&chat("SomeUser", "!p oof", false)).await;

        let replies = fx.sender.replies();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].contains("Playing: oof"));
        assert!(replies[0].contains("10 pts"));
        assert!(replies[1].contains("Insufficient points"));

        let _ = fs::remove_dir_all(fx.root);
    }

    #[tokio::test]
    async fn test_unknown_clip_is_not_found() {
        let fx = fixture("not_found", &[("50", "oof.mp3")], &[("someuser", 500)]);

        assert_eq!(
            fx.router.try_play("someuser", "nope").await,
            PlayOutcome::NotFound
        );
        assert_eq!(fx.router.points.lock().await.balance("someuser"), 500);

        let _ = fs::remove_dir_all(fx.root);
    }

    #[tokio::test]
    async fn test_unprefixed_message_is_ignored() {
        let fx = fixture("ignored", &[], &[]);
        fx.router.handle(&chat("SomeUser", "hello there", false)).await;
        fx.router.handle(&chat("SomeUser", "p oof", false)).await;
        assert!(fx.sender.replies().is_empty());

        let _ = fs::remove_dir_all(fx.root);
    }

    #[tokio::test]
    async fn test_addpoints_requires_moderator() {
        let fx = fixture("addpoints", &[], &[]);

        fx.router
            .handle(&chat("Rando", "!addpoints @friend 100", false))
            .await;
        assert!(fx.sender.replies().is_empty());
        assert_eq!(fx.router.points.lock().await.balance("friend"), 0);

        fx.router
            .handle(&chat("ModUser", "!addpoints @Friend 100", true))
            .await;
        assert_eq!(fx.router.points.lock().await.balance("friend"), 100);
        assert!(fx.sender.replies()[0].contains("100 points added to friend"));

        let _ = fs::remove_dir_all(fx.root);
    }

    #[tokio::test]
    async fn test_sounds_listing_groups_by_cost() {
        let fx = fixture(
            "listing",
            &[("50", "oof.mp3"), ("50", "pop.mp3"), ("100", "horn.mp3")],
            &[],
        );

        fx.router.handle(&chat("SomeUser", "!sounds", false)).await;

        let replies = fx.sender.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("[50 pts: oof, pop]"));
        assert!(replies[0].contains("[100 pts: horn]"));

        let _ = fs::remove_dir_all(fx.root);
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_files() {
        let fx = fixture("reload", &[("50", "oof.mp3")], &[]);

        let tier = fx.root.join("25");
        fs::create_dir_all(&tier).unwrap();
        fs::write(tier.join("fresh.mp3"), b"audio").unwrap();

        fx.router.handle(&chat("SomeUser", "!reload", false)).await;

        assert!(fx.router.catalog.read().await.get("fresh").is_some());
        assert!(fx.sender.replies()[0].contains("2 sounds indexed"));

        let _ = fs::remove_dir_all(fx.root);
    }

    #[tokio::test]
    async fn test_help_appends_moderator_commands() {
        let fx = fixture("help", &[], &[]);

        fx.router.handle(&chat("Rando", "!help", false)).await;
        fx.router.handle(&chat("ModUser", "!help", true)).await;

        let replies = fx.sender.replies();
        assert!(!replies[0].contains("!addpoints"));
        assert!(replies[1].contains("!addpoints"));
        assert!(replies[1].contains("!reload"));

        let _ = fs::remove_dir_all(fx.root);
    }
}
