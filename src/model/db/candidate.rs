use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::Year, mongodb::Id};

/// Slug used when a name has no usable characters at all.
const FALLBACK_SLUG: &str = "candidate";

/// Season details shown on a candidate's page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProfile {
    /// Key achievements this year.
    pub achievements: String,
    /// Season stats (goals, assists, etc.) as free text.
    pub stats: String,
    /// Why they deserve the award this year.
    pub why_contender: String,
    /// Major trophies won this season.
    pub trophies_won: String,
    pub goals: u32,
    pub assists: u32,
    pub appearances: u32,
    /// Average match rating, between 0.0 and 10.0.
    pub avg_match_rating: f64,
}

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// The award year this nomination is for.
    pub year: Year,
    /// Foreign Key player ID.
    pub player_id: Id,
    /// Snapshot of the player's name at nomination time.
    pub player_name: String,
    /// Snapshot of the player's country at nomination time.
    pub country: String,
    /// The player's club during the award season, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
    /// URL-friendly name, unique within the year.
    pub slug: String,
    #[serde(flatten)]
    pub profile: CandidateProfile,
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Turn a player name into a URL slug: lowercase ASCII letters and digits,
/// with every other run of characters collapsed into a single `-`.
/// Common accented Latin letters are folded to their plain equivalents.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        let folded = if c.is_ascii_alphanumeric() {
            Some(c.to_ascii_lowercase().to_string())
        } else {
            fold_latin(c.to_lowercase().next().unwrap_or(c)).map(str::to_string)
        };
        match folded {
            Some(text) => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push_str(&text);
            }
            None => pending_dash = true,
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// The slug to use for `base` given a predicate telling whether a slug is already taken:
/// `base` itself if free, otherwise the first free `base-1`, `base-2`, ...
pub fn unique_slug(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|counter| format!("{base}-{counter}"))
        .find(|slug| !is_taken(slug))
        .unwrap_or_else(|| base.to_string()) // The range is unbounded, so a free slug is always found.
}

fn fold_latin(c: char) -> Option<&'static str> {
    Some(match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'ł' | 'ľ' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'œ' => "oe",
        'ř' => "r",
        'ś' | 'š' | 'ş' | 'ș' => "s",
        'ß' => "ss",
        'ť' | 'ţ' | 'ț' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    })
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example(year: Year, player_name: &str, country: &str, club: &str) -> Self {
            Self {
                year,
                player_id: Id::new(),
                player_name: player_name.to_string(),
                country: country.to_string(),
                club: Some(club.to_string()),
                slug: slugify(player_name),
                profile: CandidateProfile::default(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_url_friendly() {
        assert_eq!(slugify("Lionel Messi"), "lionel-messi");
        assert_eq!(slugify("Kylian Mbappé"), "kylian-mbappe");
        assert_eq!(slugify("  Vinícius Júnior  "), "vinicius-junior");
        assert_eq!(slugify("Martin Ødegaard"), "martin-odegaard");
        assert_eq!(slugify("N'Golo Kanté"), "n-golo-kante");
        assert_eq!(slugify("Player #10"), "player-10");
        assert_eq!(slugify("???"), FALLBACK_SLUG);
    }

    #[test]
    fn unique_slugs_get_a_counter() {
        let taken = ["rodri", "rodri-1"];
        assert_eq!(unique_slug("pedri", |s| taken.contains(&s)), "pedri");
        assert_eq!(unique_slug("rodri", |s| taken.contains(&s)), "rodri-2");
    }
}
