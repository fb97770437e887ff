use std::collections::HashMap;

use super::{SinkError, SoundId};

/// Name a sample gets when none is given: the file name without its
/// directory or extension.
pub fn extract_file_name(source: &str) -> &str {
    let name = source.rsplit('/').next().unwrap_or(source);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub source: String,
    /// Playback length in seconds.
    pub length: f64,
    pub ready: bool,
}

#[derive(Debug, Default)]
pub struct SampleLibrary {
    samples: HashMap<SoundId, Sample>,
}

impl SampleLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sample that is still loading. Registering a name twice
    /// replaces the earlier entry.
    pub fn register(&mut self, source: &str, name: Option<&str>, length: f64) -> SoundId {
        let name = name.unwrap_or_else(|| extract_file_name(source)).to_string();
        self.samples.insert(
            name.clone(),
            Sample {
                source: source.to_string(),
                length,
                ready: false,
            },
        );
        name
    }

    pub fn mark_ready(&mut self, name: &str) -> Result<(), SinkError> {
        let sample = self
            .samples
            .get_mut(name)
            .ok_or_else(|| SinkError::UnknownSound(name.to_string()))?;
        sample.ready = true;
        Ok(())
    }

    pub fn playable(&self, name: &str) -> Result<&Sample, SinkError> {
        match self.samples.get(name) {
            Some(sample) if sample.ready => Ok(sample),
            Some(_) => Err(SinkError::NotLoaded(name.to_string())),
            None => Err(SinkError::UnknownSound(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.samples.contains_key(name)
    }

    pub fn all_ready(&self) -> bool {
        self.samples.values().all(|s| s.ready)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_from_source() {
        assert_eq!(extract_file_name("sounds/click1.wav"), "click1");
        assert_eq!(extract_file_name("https://host/a/b/accent.ogg"), "accent");
        assert_eq!(extract_file_name("click"), "click");
        assert_eq!(extract_file_name("dir/.hidden"), ".hidden");
        assert_eq!(extract_file_name("archive.tar.gz"), "archive.tar");
    }

    #[test]
    fn samples_are_playable_once_ready() {
        let mut library = SampleLibrary::new();
        let name = library.register("sounds/click2.wav", None, 0.05);
        assert_eq!(name, "click2");

        assert_eq!(
            library.playable("click2"),
            Err(SinkError::NotLoaded("click2".into()))
        );
        assert!(!library.all_ready());

        library.mark_ready("click2").unwrap();
        assert!(library.all_ready());
        assert_eq!(library.playable("click2").unwrap().length, 0.05);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let mut library = SampleLibrary::new();
        assert_eq!(
            library.mark_ready("nope"),
            Err(SinkError::UnknownSound("nope".into()))
        );
        assert!(library.playable("nope").is_err());
    }
}
