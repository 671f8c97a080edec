use std::collections::BTreeSet;
use std::fmt;

use parking_lot::Mutex;

/// Support code the emitted functions rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    RandomGenerator,
    WallClock,
    MathLibrary,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::RandomGenerator => "random-generator",
            Feature::WallClock => "wall-clock",
            Feature::MathLibrary => "math-library",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buffer {
    Declarations,
    Definitions,
    Inline,
}

/// The three output buffers of a run. Each append is atomic.
#[derive(Default)]
pub struct OutputSink {
    declarations: Mutex<String>,
    definitions: Mutex<String>,
    inline: Mutex<String>,
    features: Mutex<BTreeSet<Feature>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkContents {
    pub declarations: String,
    pub definitions: String,
    pub inline: String,
    pub features: BTreeSet<Feature>,
}

impl OutputSink {
    pub fn new() -> Self {
        OutputSink::default()
    }

    fn buffer(&self, buffer: Buffer) -> &Mutex<String> {
        match buffer {
            Buffer::Declarations => &self.declarations,
            Buffer::Definitions => &self.definitions,
            Buffer::Inline => &self.inline,
        }
    }

    pub fn append(&self, buffer: Buffer, text: &str) {
        self.buffer(buffer).lock().push_str(text);
    }

    pub fn require(&self, feature: Feature) {
        self.features.lock().insert(feature);
    }

    pub fn requires(&self, feature: Feature) -> bool {
        self.features.lock().contains(&feature)
    }

    pub fn contents(&self, buffer: Buffer) -> String {
        self.buffer(buffer).lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.lock().is_empty() && self.definitions.lock().is_empty() && self.inline.lock().is_empty()
    }

    pub fn into_contents(self) -> SinkContents {
        SinkContents {
            declarations: self.declarations.into_inner(),
            definitions: self.definitions.into_inner(),
            inline: self.inline.into_inner(),
            features: self.features.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let sink = OutputSink::new();
        (0..64).into_par_iter().for_each(|i| {
            sink.append(Buffer::Definitions, &format!("line {}\n", i));
        });
        sink.require(Feature::WallClock);
        let contents = sink.into_contents();
        let mut lines: Vec<&str> = contents.definitions.lines().collect();
        lines.sort();
        lines.dedup();
        assert_eq!(lines.len(), 64);
        assert!(contents.declarations.is_empty());
        assert_eq!(contents.features.into_iter().collect::<Vec<_>>(), vec![Feature::WallClock]);
    }
}
