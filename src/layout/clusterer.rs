use crate::models::{FontTier, LayoutLine, RawTextBlock};

/// Groups raw OCR tokens into ordered reading lines and infers a coarse
/// font-size tier per line from block heights.
///
/// Two firm modes: whenever any block carries geometry, block-based
/// clustering is used; the flat-text fallback applies only when the engine
/// returned no bounding boxes at all.
#[derive(Debug, Clone)]
pub struct LayoutClusterer {
    /// Vertical-center distance (px) within which blocks share a line.
    line_tolerance: f32,
    /// Relative height difference within which two heights share a tier
    /// bucket.
    tier_tolerance: f32,
}

impl Default for LayoutClusterer {
    fn default() -> Self {
        Self {
            line_tolerance: 10.0,
            tier_tolerance: 0.10,
        }
    }
}

struct LineGroup<'a> {
    center_y: f32,
    blocks: Vec<&'a RawTextBlock>,
}

impl LayoutClusterer {
    pub fn new(line_tolerance: f32, tier_tolerance: f32) -> Self {
        Self {
            line_tolerance,
            tier_tolerance,
        }
    }

    pub fn cluster(&self, blocks: &[RawTextBlock], flat_text: &str) -> Vec<LayoutLine> {
        let geometric: Vec<&RawTextBlock> = blocks
            .iter()
            .filter(|b| b.bounds.is_some() && !b.text.trim().is_empty())
            .collect();

        if geometric.is_empty() {
            return Self::cluster_flat(flat_text);
        }

        self.cluster_blocks(&geometric)
    }

    /// Newline fallback: each non-empty line of the flat recognized text
    /// becomes one line with no font tier.
    fn cluster_flat(flat_text: &str) -> Vec<LayoutLine> {
        flat_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(LayoutLine::new)
            .collect()
    }

    fn cluster_blocks(&self, blocks: &[&RawTextBlock]) -> Vec<LayoutLine> {
        let mut groups: Vec<LineGroup<'_>> = Vec::new();

        for block in blocks {
            let Some(bounds) = block.bounds else { continue };
            let center = bounds.vertical_center();
            // The group keeps the center of its first block, so membership
            // does not drift as blocks accumulate.
            match groups
                .iter_mut()
                .find(|g| (g.center_y - center).abs() <= self.line_tolerance)
            {
                Some(group) => group.blocks.push(block),
                None => groups.push(LineGroup {
                    center_y: center,
                    blocks: vec![block],
                }),
            }
        }

        groups.sort_by(|a, b| a.center_y.total_cmp(&b.center_y));

        let mut lines: Vec<(String, f32)> = Vec::new();
        for group in &mut groups {
            group.blocks.sort_by(|a, b| {
                let ax = a.bounds.map(|bounds| bounds.x).unwrap_or(0.0);
                let bx = b.bounds.map(|bounds| bounds.x).unwrap_or(0.0);
                ax.total_cmp(&bx)
            });

            let text = group
                .blocks
                .iter()
                .map(|b| b.text.trim())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();

            if text.is_empty() {
                continue;
            }

            let height = group
                .blocks
                .iter()
                .filter_map(|b| b.font_height())
                .fold(0.0_f32, f32::max);

            lines.push((text, height));
        }

        let buckets = self.height_buckets(lines.iter().map(|(_, h)| *h));

        lines
            .into_iter()
            .map(|(text, height)| LayoutLine {
                text,
                tier: Some(self.tier_for(height, &buckets)),
            })
            .collect()
    }

    /// Bucket the document's line heights into representatives, largest
    /// first. A height joins an existing bucket when it falls within the
    /// relative tolerance of that bucket's representative.
    fn height_buckets(&self, heights: impl Iterator<Item = f32>) -> Vec<f32> {
        let mut sorted: Vec<f32> = heights.collect();
        sorted.sort_by(|a, b| b.total_cmp(a));

        let mut buckets: Vec<f32> = Vec::new();
        for height in sorted {
            let fits = buckets
                .iter()
                .any(|rep| (rep - height).abs() <= rep * self.tier_tolerance);
            if !fits {
                buckets.push(height);
            }
        }
        buckets
    }

    fn tier_for(&self, height: f32, buckets: &[f32]) -> FontTier {
        let rank = buckets
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - height).abs().total_cmp(&(*b - height).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        FontTier::from_rank(rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;
    use pretty_assertions::assert_eq;

    fn block(text: &str, x: f32, y: f32, height: f32) -> RawTextBlock {
        RawTextBlock::with_bounds(
            text,
            BoundingBox {
                x,
                y,
                width: text.len() as f32 * 8.0,
                height,
            },
        )
    }

    #[test]
    fn groups_blocks_on_the_same_visual_line() {
        let blocks = vec![
            block("Grilled", 10.0, 100.0, 18.0),
            block("Salmon", 80.0, 103.0, 18.0),
            block("Served", 10.0, 140.0, 12.0),
            block("daily", 70.0, 141.0, 12.0),
        ];

        let lines = LayoutClusterer::default().cluster(&blocks, "");
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Grilled Salmon", "Served daily"]);
    }

    #[test]
    fn orders_lines_top_to_bottom_and_blocks_left_to_right() {
        let blocks = vec![
            block("daily", 70.0, 141.0, 12.0),
            block("Salmon", 80.0, 103.0, 18.0),
            block("Served", 10.0, 140.0, 12.0),
            block("Grilled", 10.0, 100.0, 18.0),
        ];

        let lines = LayoutClusterer::default().cluster(&blocks, "");
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Grilled Salmon", "Served daily"]);
    }

    #[test]
    fn assigns_descending_font_tiers() {
        let blocks = vec![
            block("TRATTORIA ROMA", 10.0, 10.0, 40.0),
            block("APPETIZERS", 10.0, 80.0, 28.0),
            block("Bruschetta", 10.0, 130.0, 18.0),
            block("Toasted bread with tomato", 10.0, 170.0, 11.0),
        ];

        let lines = LayoutClusterer::default().cluster(&blocks, "");
        let tiers: Vec<Option<FontTier>> = lines.iter().map(|l| l.tier).collect();
        assert_eq!(
            tiers,
            vec![
                Some(FontTier::Heading),
                Some(FontTier::Section),
                Some(FontTier::Dish),
                Some(FontTier::Description),
            ]
        );
    }

    #[test]
    fn merges_heights_within_tolerance_into_one_bucket() {
        // 18.0 and 19.0 are within 10% of each other and must share a tier.
        let blocks = vec![
            block("APPETIZERS", 10.0, 10.0, 30.0),
            block("Bruschetta", 10.0, 60.0, 18.0),
            block("Calamari", 10.0, 100.0, 19.0),
        ];

        let lines = LayoutClusterer::default().cluster(&blocks, "");
        assert_eq!(lines[1].tier, lines[2].tier);
        assert_eq!(lines[0].tier, Some(FontTier::Heading));
    }

    #[test]
    fn falls_back_to_flat_text_without_geometry() {
        let flat = "APPETIZERS\nBruschetta\n\n  Grilled Salmon  \n";
        let lines = LayoutClusterer::default().cluster(&[], flat);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["APPETIZERS", "Bruschetta", "Grilled Salmon"]);
        assert!(lines.iter().all(|l| l.tier.is_none()));
    }

    #[test]
    fn prefers_blocks_over_flat_text_when_geometry_present() {
        let blocks = vec![block("Real", 0.0, 0.0, 12.0), block("line", 40.0, 1.0, 12.0)];
        let lines = LayoutClusterer::default().cluster(&blocks, "stale flat text");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Real line");
    }

    #[test]
    fn clustering_is_deterministic() {
        let blocks = vec![
            block("MAINS", 10.0, 10.0, 26.0),
            block("Pasta", 10.0, 50.0, 16.0),
            block("Carbonara", 60.0, 52.0, 16.0),
            block("Rich and creamy", 10.0, 90.0, 10.0),
        ];

        let clusterer = LayoutClusterer::default();
        let first = clusterer.cluster(&blocks, "");
        let second = clusterer.cluster(&blocks, "");
        assert_eq!(first, second);
    }
}
