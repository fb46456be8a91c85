//! Rotating ayat/hadith panel

use serde::Serialize;
use utoipa::ToSchema;

/// A verse or hadith with its translation
#[derive(Debug, Clone, Copy)]
pub struct AyatEntry {
    pub arabic: &'static str,
    pub english: &'static str,
}

pub const AYAT_HADITH: &[AyatEntry] = &[
    AyatEntry {
        arabic: "إِنَّ الصَّلَاةَ تَنْهَىٰ عَنِ الْفَحْشَاءِ وَالْمُنكَرِ",
        english: "Indeed, prayer prohibits immorality and wrongdoing. (Quran 29:45)",
    },
    AyatEntry {
        arabic: "خَيْرُكُمْ أَحْسَنُكُمْ أَخْلَاقًا",
        english: "The best among you are those who have the best manners and character. (Bukhari)",
    },
    AyatEntry {
        arabic: "فَاذْكُرُونِي أَذْكُرْكُمْ",
        english: "So remember Me; I will remember you. (Quran 2:152)",
    },
    AyatEntry {
        arabic: "مَنْ لَا يَشْكُرِ النَّاسَ لَا يَشْكُرِ اللَّهَ",
        english: "Whoever does not thank people has not thanked Allah. (Tirmidhi)",
    },
    AyatEntry {
        arabic: "وَوَجَدَكَ ضَالًّا فَهَدَىٰ",
        english: "And He found you lost and guided [you]. (Quran 93:7)",
    },
    AyatEntry {
        arabic: "لَيْسَ الشَّدِيدُ بِالصُّرَعَةِ، إِنَّمَا الشَّدِيدُ الَّذِي يَمْلِكُ نَفْسَهُ عِندَ الْغَضَبِ",
        english: "The strong man is not the one who can overpower others. The strong man is the one who controls himself when angry. (Bukhari)",
    },
    AyatEntry {
        arabic: "وَلَسَوْفَ يُعْطِيكَ رَبُّكَ فَتَرْضَىٰ",
        english: "And your Lord is going to give you, and you will be satisfied. (Quran 93:5)",
    },
    AyatEntry {
        arabic: "يَسِّرُوا وَلَا تُعَسِّرُوا",
        english: "Make things easy and do not make them difficult. (Bukhari)",
    },
    AyatEntry {
        arabic: "وَمَن يَتَوَكَّلْ عَلَى اللَّهِ فَهُوَ حَسْبُهُ",
        english: "And whoever puts his trust in Allah, then He will suffice him. (Quran 65:3)",
    },
    AyatEntry {
        arabic: "لَا يُؤْمِنُ أَحَدُكُمْ حَتَّى يُحِبَّ لأَخِيهِ مَا يُحِبُّ لِنَفْسِهِ",
        english: "None of you truly believes until he loves for his brother what he loves for himself. (Bukhari & Muslim)",
    },
];

/// Cleaned-up entry as displayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AyatView {
    pub index: usize,
    pub arabic: String,
    pub english: String,
}

/// Round-robin over a fixed list of entries
#[derive(Debug, Clone)]
pub struct RotatingText {
    entries: &'static [AyatEntry],
    index: usize,
}

impl RotatingText {
    pub fn new(entries: &'static [AyatEntry]) -> Self {
        Self { entries, index: 0 }
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn advance(&mut self) -> Option<AyatView> {
        if self.entries.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % self.entries.len();
        self.current()
    }

    pub fn current(&self) -> Option<AyatView> {
        let entry = self.entries.get(self.index)?;
        Some(AyatView {
            index: self.index,
            arabic: trim_arabic(entry.arabic).to_string(),
            english: trim_citation_period(entry.english),
        })
    }
}

impl Default for RotatingText {
    fn default() -> Self {
        Self::new(AYAT_HADITH)
    }
}

/// Drop trailing full stops (Latin or Arabic)
fn trim_arabic(text: &str) -> &str {
    text.trim_end_matches(&['.', '\u{06D4}'][..])
}

/// Drop the first run of periods that sits right before a `(source)` citation
fn trim_citation_period(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'.' {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i] == b'.' {
            i += 1;
        }
        if text[i..].trim_start().starts_with('(') {
            return format!("{}{}", &text[..start], &text[i..]);
        }
    }
    text.to_string()
}
