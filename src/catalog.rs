use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

const AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "wav", "ogg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub path: PathBuf,
    pub cost: i64,
}

/// Index of playable clips built from a directory tree. Immediate
/// subdirectories whose names parse as a non-negative integer are cost tiers;
/// every recognized audio file inside is indexed under its lowercased base
/// name. A rebuild replaces the previous index wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioCatalog {
    clips: HashMap<String, AudioClip>,
}

impl AudioCatalog {
    /// A missing root directory yields an empty catalog rather than an error.
    pub fn scan(root: &Path) -> Self {
        let mut clips = HashMap::new();

        let tiers = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(_) => return Self { clips },
        };

        let mut tier_dirs: Vec<(i64, PathBuf)> = tiers
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if !path.is_dir() {
                    return None;
                }
                let cost: i64 = entry.file_name().to_str()?.parse().ok()?;
                if cost < 0 {
                    return None;
                }
                Some((cost, path))
            })
            .collect();
        // Directory order is filesystem-dependent; sort so a rescan of an
        // unchanged tree always produces the same index.
        tier_dirs.sort();

        for (cost, dir) in tier_dirs {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    log::error!("Failed to read tier directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            let mut files: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
            files.sort();

            for file in files {
                if let Some(name) = clip_name(&file) {
                    // last write wins on name collision
                    clips.insert(name, AudioClip { path: file, cost });
                }
            }
        }

        Self { clips }
    }

    pub fn get(&self, name: &str) -> Option<&AudioClip> {
        self.clips.get(name)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Clip names grouped by cost tier, both levels sorted, for chat listings
    pub fn by_cost(&self) -> BTreeMap<i64, Vec<String>> {
        let mut grouped: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        for (name, clip) in &self.clips {
            grouped.entry(clip.cost).or_default().push(name.clone());
        }
        for names in grouped.values_mut() {
            names.sort();
        }
        grouped
    }
}

fn clip_name(file: &Path) -> Option<String> {
    if !file.is_file() {
        return None;
    }
    let extension = file.extension()?.to_str()?.to_lowercase();
    if !AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }
    Some(file.file_stem()?.to_str()?.to_lowercase())
}
