//! セクション分類モジュール - パート名から楽器セクションへの振り分け

use regex::Regex;
use std::fmt;

/// 楽器セクション（Exports配下のフォルダ名に対応）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Strings,
    Woodwinds,
    Brass,
    Percussion,
    Vocals,
    /// どのセクションにも一致しないパート
    Other,
}

impl Section {
    /// 出力フォルダ名
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Strings => "Strings",
            Section::Woodwinds => "Woodwinds",
            Section::Brass => "Brass",
            Section::Percussion => "Percussion",
            Section::Vocals => "Vocals",
            Section::Other => "Other",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 組み込みセクション定義（この宣言順に照合される）
const SECTION_INSTRUMENTS: &[(Section, &[&str])] = &[
    (
        Section::Strings,
        &["Violin", "Viola", "Violoncello", "Contrabass", "Strings"],
    ),
    (
        Section::Woodwinds,
        &[
            "Piccolo",
            "Flute",
            "Oboe",
            "English Horn",
            "Clarinet",
            "Bass Clarinet",
            "Bassoon",
            "Alto Saxophone",
            "Tenor Saxophone",
            "Baritone Saxophone",
            "Woodwinds",
        ],
    ),
    (
        Section::Brass,
        &["French Horn", "Trumpet", "Trombone", "Euphonium", "Tuba", "Brass"],
    ),
    (
        Section::Percussion,
        &[
            "Timpani",
            "Drumset",
            "Tambourine",
            "Cymbal",
            "Cymbals",
            "Shaker",
            "Bass Drum",
            "Glockenspiel",
            "Xylophone",
            "Snare Drum",
            "Suspended Cymbal",
            "Crash Cymbal",
            "Percussion",
        ],
    ),
    (
        Section::Vocals,
        &["Soprano", "Alto", "Tenor", "Bass", "Vocals"],
    ),
];

/// パート名をセクションへ振り分ける分類器
///
/// セクションごとの楽器名リストを構築時に1本のアンカー付き正規表現へ
/// コンパイルして保持する。構築後は読み取り専用。
pub struct SectionClassifier {
    patterns: Vec<(Section, Regex)>,
}

impl SectionClassifier {
    /// 組み込みセクション定義で分類器を作成
    pub fn new() -> Self {
        Self::with_sections(SECTION_INSTRUMENTS)
    }

    /// 任意のセクション定義で分類器を作成
    ///
    /// 受け付けるのは「楽器名」「楽器名 + 半角スペース + 番号」
    /// 「楽器名 + 括弧書き」の全体一致のみ。部分一致はしない。
    pub fn with_sections(sections: &[(Section, &[&str])]) -> Self {
        let patterns = sections
            .iter()
            .map(|(section, instruments)| {
                let alternation = instruments
                    .iter()
                    .map(|name| regex::escape(name))
                    .collect::<Vec<_>>()
                    .join("|");
                let pattern = format!(r"^(?:{})(?: \d+|\s*\(.*\))?$", alternation);
                // 楽器名はエスケープ済みのためパターンは常に有効
                (*section, Regex::new(&pattern).unwrap())
            })
            .collect();
        Self { patterns }
    }

    /// パート名をセクションへ振り分け（一致しなければ Other）
    pub fn classify(&self, part: &str) -> Section {
        for (section, pattern) in &self.patterns {
            if pattern.is_match(part) {
                return *section;
            }
        }
        Section::Other
    }
}

impl Default for SectionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_violin_variants_as_strings() {
        let classifier = SectionClassifier::new();
        for label in ["Violin", "Violin 1", "Violin 12", "Violin (solo)"] {
            assert_eq!(classifier.classify(label), Section::Strings, "{}", label);
        }
    }

    #[test]
    fn section_names_classify_to_their_own_section() {
        let classifier = SectionClassifier::new();
        assert_eq!(classifier.classify("Strings"), Section::Strings);
        assert_eq!(classifier.classify("Woodwinds"), Section::Woodwinds);
        assert_eq!(classifier.classify("Brass"), Section::Brass);
        assert_eq!(classifier.classify("Percussion"), Section::Percussion);
        assert_eq!(classifier.classify("Vocals"), Section::Vocals);
    }

    #[test]
    fn unknown_labels_fall_back_to_other() {
        let classifier = SectionClassifier::new();
        assert_eq!(classifier.classify("Kazoo"), Section::Other);
        assert_eq!(classifier.classify(""), Section::Other);
    }

    #[test]
    fn matching_is_anchored_at_both_ends() {
        let classifier = SectionClassifier::new();
        // 前方一致・後方一致だけでは振り分けない
        assert_eq!(classifier.classify("Violins"), Section::Other);
        assert_eq!(classifier.classify("Viola da gamba"), Section::Other);
        assert_eq!(classifier.classify("Solo Violin"), Section::Other);
    }

    #[test]
    fn parenthetical_suffix_is_accepted() {
        let classifier = SectionClassifier::new();
        assert_eq!(classifier.classify("Clarinet (Bb)"), Section::Woodwinds);
        assert_eq!(classifier.classify("Trumpet (C)"), Section::Brass);
    }

    #[test]
    fn longer_literals_win_over_their_prefixes() {
        let classifier = SectionClassifier::new();
        // "Bass" 単体はVocals、"Bass Drum" はPercussionの楽器名として一致
        assert_eq!(classifier.classify("Bass"), Section::Vocals);
        assert_eq!(classifier.classify("Bass Drum"), Section::Percussion);
        assert_eq!(classifier.classify("Bass Clarinet"), Section::Woodwinds);
    }

    #[test]
    fn first_declared_section_wins_on_overlap() {
        // 同じ楽器名が複数セクションにある場合は宣言順の先勝ち
        let sections: &[(Section, &[&str])] = &[
            (Section::Strings, &["Lyre"]),
            (Section::Percussion, &["Lyre"]),
        ];
        let classifier = SectionClassifier::with_sections(sections);
        assert_eq!(classifier.classify("Lyre"), Section::Strings);
    }

    #[test]
    fn numbering_requires_single_space() {
        let classifier = SectionClassifier::new();
        assert_eq!(classifier.classify("Violin  1"), Section::Other);
        assert_eq!(classifier.classify("Violin1"), Section::Other);
    }
}
