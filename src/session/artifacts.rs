//! Append-only chart collection for one session.

use super::types::Artifact;

/// Ordered charts produced across all iterations.
///
/// Never deduplicated, pruned or reordered: a chart's position is its identity.
#[derive(Debug, Default)]
pub struct ArtifactAccumulator {
    artifacts: Vec<Artifact>,
}

impl ArtifactAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chart, titling it by its 1-based position.
    pub fn append_chart(&mut self, image_base64: String) -> &Artifact {
        let position = self.artifacts.len() + 1;
        self.append(Artifact::chart(position, image_base64))
    }

    pub fn append(&mut self, artifact: Artifact) -> &Artifact {
        self.artifacts.push(artifact);
        &self.artifacts[self.artifacts.len() - 1]
    }

    pub fn snapshot(&self) -> Vec<Artifact> {
        self.artifacts.clone()
    }

    /// Consume the accumulator, keeping append order.
    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles_follow_global_position() {
        let mut acc = ArtifactAccumulator::new();
        acc.append_chart("a".to_string());
        acc.append_chart("b".to_string());
        let third = acc.append_chart("c".to_string()).title.clone();
        assert_eq!(third, "Chart 3");
        assert_eq!(acc.len(), 3);
    }

    #[test]
    fn test_identical_payloads_are_kept() {
        let mut acc = ArtifactAccumulator::new();
        acc.append_chart("same".to_string());
        acc.append_chart("same".to_string());
        let snapshot = acc.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].title, "Chart 1");
        assert_eq!(snapshot[1].title, "Chart 2");
    }
}
