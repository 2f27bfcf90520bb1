use crate::models::trip::{Gender, TravelerKind};

pub const INFANT_AVATAR: &str = "👶";
pub const GIRL_AVATAR: &str = "👧";
pub const BOY_AVATAR: &str = "👦";
pub const WOMAN_AVATAR: &str = "👩";
pub const MAN_AVATAR: &str = "👨";
pub const DEFAULT_AVATAR: &str = "🧑";

/// Picks an avatar for a traveler who did not supply one.
pub trait AvatarAssigner: Send + Sync {
    fn assign(&self, age: u32, gender: Option<Gender>, kind: TravelerKind) -> String;
}

/// Emoji avatars by age band and gender.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmojiAvatarAssigner;

impl AvatarAssigner for EmojiAvatarAssigner {
    fn assign(&self, age: u32, gender: Option<Gender>, kind: TravelerKind) -> String {
        let by_gender = |female: &'static str, male: &'static str| match gender {
            Some(Gender::Female) => female,
            Some(Gender::Male) => male,
            None => DEFAULT_AVATAR,
        };

        let avatar = if age <= 2 || kind == TravelerKind::Infant {
            INFANT_AVATAR
        } else if age <= 12 || kind == TravelerKind::Child {
            by_gender(GIRL_AVATAR, BOY_AVATAR)
        } else {
            // Teens and adults share the same glyphs.
            by_gender(WOMAN_AVATAR, MAN_AVATAR)
        };
        avatar.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infants() {
        let a = EmojiAvatarAssigner;
        assert_eq!(a.assign(1, Some(Gender::Male), TravelerKind::Child), INFANT_AVATAR);
        assert_eq!(a.assign(5, None, TravelerKind::Infant), INFANT_AVATAR);
    }

    #[test]
    fn test_children_by_gender() {
        let a = EmojiAvatarAssigner;
        assert_eq!(a.assign(7, Some(Gender::Female), TravelerKind::Child), GIRL_AVATAR);
        assert_eq!(a.assign(7, Some(Gender::Male), TravelerKind::Child), BOY_AVATAR);
        assert_eq!(a.assign(7, None, TravelerKind::Child), DEFAULT_AVATAR);
        // Declared child wins over age.
        assert_eq!(a.assign(14, Some(Gender::Male), TravelerKind::Child), BOY_AVATAR);
    }

    #[test]
    fn test_teens_and_adults() {
        let a = EmojiAvatarAssigner;
        assert_eq!(a.assign(15, Some(Gender::Female), TravelerKind::Adult), WOMAN_AVATAR);
        assert_eq!(a.assign(40, Some(Gender::Male), TravelerKind::Adult), MAN_AVATAR);
        assert_eq!(a.assign(40, None, TravelerKind::Adult), DEFAULT_AVATAR);
    }
}
