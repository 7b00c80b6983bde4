/*
Message catalogue for user-facing texts.

This module provides:
- Embedded EN/RU translations (compile-time embedded JSON).
- A `tr` function to look up a translation by key + optional params.
- `t` / `t_with` convenience wrappers using the default language (DEFAULT_LANG).

Usage:
    use crate::i18n;
    let msg = i18n::t("sharing.already_shared");
    let msg_with = i18n::t_with("notifications.invited", &[("pet", "Rex"), ("level", "viewer")]);

Notes:
- Placeholders in translation strings use single-brace format: `{name}`.
- If a key is missing for the requested language, the default language is
  used, then the key itself.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANG: &str = "en";

static TRANSLATIONS: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();

const EN_JSON: &str = r#"
{
  "access.no_access": "You do not have access to this pet",
  "access.insufficient_permission": "Your access level does not allow this action",
  "sharing.user_not_found": "No user is registered with this email",
  "sharing.self_share_not_allowed": "You cannot share a pet with its owner",
  "sharing.cannot_grant_owner": "Owner access cannot be granted",
  "sharing.already_shared": "This pet is already shared with that user",
  "sharing.owner_grant_immutable": "The owner's access cannot be changed or removed",
  "sharing.grant_not_found": "That user does not have access to this pet",
  "notifications.invited": "You now have {level} access to pet {pet}",
  "notifications.level_changed": "Your access to pet {pet} is now {level}",
  "notifications.revoked": "Your access to pet {pet} was removed",
  "app.name": "Pet Health Tracker"
}
"#;

const RU_JSON: &str = r#"
{
  "access.no_access": "У вас нет доступа к этому питомцу",
  "access.insufficient_permission": "Ваш уровень доступа не позволяет выполнить это действие",
  "sharing.user_not_found": "Пользователь с таким email не зарегистрирован",
  "sharing.self_share_not_allowed": "Нельзя поделиться питомцем с его владельцем",
  "sharing.cannot_grant_owner": "Права владельца выдать нельзя",
  "sharing.already_shared": "Этот питомец уже доступен этому пользователю",
  "sharing.owner_grant_immutable": "Доступ владельца нельзя изменить или отозвать",
  "sharing.grant_not_found": "У этого пользователя нет доступа к питомцу",
  "notifications.invited": "Вам открыт доступ «{level}» к питомцу {pet}",
  "notifications.level_changed": "Ваш доступ к питомцу {pet} изменён на «{level}»",
  "notifications.revoked": "Ваш доступ к питомцу {pet} отозван",
  "app.name": "Pet Health Tracker"
}
"#;

fn build_translations() -> HashMap<String, HashMap<String, String>> {
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();

    // Parse EN
    let en_map: HashMap<String, String> = serde_json::from_str(EN_JSON).unwrap_or_else(|e| {
        panic!("failed to parse EN_JSON in i18n module: {}", e);
    });
    out.insert("en".to_string(), en_map);

    // Parse RU
    let ru_map: HashMap<String, String> = serde_json::from_str(RU_JSON).unwrap_or_else(|e| {
        panic!("failed to parse RU_JSON in i18n module: {}", e);
    });
    out.insert("ru".to_string(), ru_map);

    out
}

/// Returns the global translations map (lang -> (key -> message)).
fn translations() -> &'static HashMap<String, HashMap<String, String>> {
    TRANSLATIONS.get_or_init(build_translations)
}

/// Translate a key using an explicit language (or default if None).
///
/// Returns the translated and parameter-substituted string. If no translation is found,
/// returns the default language value or the key itself.
pub fn tr(lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    let map = translations();

    let desired = lang.unwrap_or(DEFAULT_LANG);

    let val = map
        .get(desired)
        .and_then(|m| m.get(key))
        .cloned()
        .or_else(|| map.get(DEFAULT_LANG).and_then(|m| m.get(key)).cloned())
        // If still missing, return the key itself (useful in logs)
        .unwrap_or_else(|| key.to_string());

    if let Some(params) = params {
        let mut s = val;
        for (k, v) in params {
            s = s.replace(&format!("{{{}}}", k), v);
        }
        s
    } else {
        val
    }
}

/// Convenience wrapper: translate using default language (DEFAULT_LANG).
pub fn t(key: &str) -> String {
    tr(None, key, None)
}

/// Convenience wrapper with params (default language).
pub fn t_with(key: &str, params: &[(&str, &str)]) -> String {
    tr(None, key, Some(params))
}
