//! Light/dark color scheme resolution.
//!
//! Everything here is a pure function of a [`ThemePreference`] (the stored
//! value) and a [`ThemeEnvironment`] (what the page and clock say). The result
//! is a [`ThemePlan`] that an adapter applies to a page and a
//! [`PreferenceStore`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::Timelike as _;
use serde::Serialize;
use serde_json::json;

pub const PREFERENCE_KEY: &str = "Fluid_Color_Scheme";
pub const SCHEME_ATTR: &str = "data-user-color-scheme";
pub const DEFAULT_SCHEME_ATTR: &str = "data-default-color-scheme";
pub const ICON_ID: &str = "color-toggle-icon";
pub const LIGHT_HIGHLIGHT_ID: &str = "highlight-css";
pub const DARK_HIGHLIGHT_ID: &str = "highlight-css-dark";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Light,
    Dark,
}

impl ColorScheme {
    /// Parses a scheme name after dropping quotes and whitespace, the way
    /// values read back from CSS custom properties need it.
    ///
    /// Stored preferences go through here too, so a padded `" dark"` is
    /// honored instead of being reset.
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn icon_class(self) -> String {
        format!("icon-{}", self.as_str())
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '"' | '\'') && !c.is_whitespace())
        .collect()
}

/// The persisted preference as read, valid or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemePreference {
    pub stored: Option<String>,
}

impl ThemePreference {
    pub fn load(store: &dyn PreferenceStore) -> Self {
        Self {
            stored: store.get(PREFERENCE_KEY),
        }
    }
}

/// Page and clock inputs to scheme resolution.
#[derive(Debug, Clone, Default)]
pub struct ThemeEnvironment {
    /// Raw `data-default-color-scheme` of the root element.
    pub default_attr: Option<String>,
    /// Raw `--color-mode` custom property (follows `prefers-color-scheme`).
    pub color_mode: Option<String>,
    /// Local hour of day, 0..=23.
    pub hour: u32,
}

impl ThemeEnvironment {
    pub fn with_local_hour(default_attr: Option<String>, color_mode: Option<String>) -> Self {
        Self {
            default_attr,
            color_mode,
            hour: chrono::Local::now().hour(),
        }
    }

    /// Explicit page default, then the system preference, then night hours
    /// (18:00 through 06:59) mean dark.
    pub fn default_scheme(&self) -> ColorScheme {
        if let Some(s) = self.default_attr.as_deref().and_then(ColorScheme::parse) {
            return s;
        }
        if let Some(s) = self.color_mode.as_deref().and_then(ColorScheme::parse) {
            return s;
        }
        if self.hour >= 18 || self.hour <= 6 {
            ColorScheme::Dark
        } else {
            ColorScheme::Light
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "value", rename_all = "lowercase")]
pub enum PreferenceChange {
    Keep,
    Set(ColorScheme),
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconState {
    pub class: String,
    /// The scheme a click would switch to.
    pub data: ColorScheme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StylesheetState {
    pub id: &'static str,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetNotification {
    /// Call a method on a global object, e.g. `REMARK42.changeTheme("dark")`.
    CallMethod {
        global: &'static str,
        method: &'static str,
        argument: String,
    },
    /// `postMessage` into the iframe matched by `selector`.
    PostMessage {
        selector: &'static str,
        target_origin: &'static str,
        payload: serde_json::Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemePlan {
    /// Resolved scheme, `None` when the requested or stored value was invalid.
    pub scheme: Option<ColorScheme>,
    /// Value for the root element's `data-user-color-scheme`.
    pub root_scheme: ColorScheme,
    pub preference: PreferenceChange,
    pub icon: Option<IconState>,
    pub stylesheets: Vec<StylesheetState>,
    pub notifications: Vec<WidgetNotification>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetMarker {
    /// A script-defined global such as `REMARK42`.
    Global(&'static str),
    /// An element selector such as `iframe.giscus-frame`.
    Selector(&'static str),
}

/// Answers whether a widget is present on the page.
pub trait WidgetPresence {
    fn has(&self, marker: WidgetMarker) -> bool;
}

/// Treats every widget as present.
pub struct AllPresent;

impl WidgetPresence for AllPresent {
    fn has(&self, _marker: WidgetMarker) -> bool {
        true
    }
}

/// A third-party widget that follows the page scheme.
pub trait WidgetNotifier {
    fn marker(&self) -> WidgetMarker;
    fn message(&self, scheme: ColorScheme) -> WidgetNotification;
}

pub struct Remark42;

impl WidgetNotifier for Remark42 {
    fn marker(&self) -> WidgetMarker {
        WidgetMarker::Global("REMARK42")
    }

    fn message(&self, scheme: ColorScheme) -> WidgetNotification {
        WidgetNotification::CallMethod {
            global: "REMARK42",
            method: "changeTheme",
            argument: scheme.to_string(),
        }
    }
}

pub struct Cusdis;

impl WidgetNotifier for Cusdis {
    fn marker(&self) -> WidgetMarker {
        WidgetMarker::Global("CUSDIS")
    }

    fn message(&self, scheme: ColorScheme) -> WidgetNotification {
        WidgetNotification::CallMethod {
            global: "CUSDIS",
            method: "setTheme",
            argument: scheme.to_string(),
        }
    }
}

pub struct Utterances {
    pub light: String,
    pub dark: String,
}

impl WidgetNotifier for Utterances {
    fn marker(&self) -> WidgetMarker {
        WidgetMarker::Selector(".utterances-frame")
    }

    fn message(&self, scheme: ColorScheme) -> WidgetNotification {
        let theme = match scheme {
            ColorScheme::Dark => &self.dark,
            ColorScheme::Light => &self.light,
        };
        WidgetNotification::PostMessage {
            selector: ".utterances-frame",
            target_origin: "https://utteranc.es",
            payload: json!({ "type": "set-theme", "theme": theme }),
        }
    }
}

pub struct Giscus {
    pub light: String,
    pub dark: String,
}

impl WidgetNotifier for Giscus {
    fn marker(&self) -> WidgetMarker {
        WidgetMarker::Selector("iframe.giscus-frame")
    }

    fn message(&self, scheme: ColorScheme) -> WidgetNotification {
        let theme = match scheme {
            ColorScheme::Dark => &self.dark,
            ColorScheme::Light => &self.light,
        };
        WidgetNotification::PostMessage {
            selector: "iframe.giscus-frame",
            target_origin: "https://giscus.app",
            payload: json!({ "giscus": { "setConfig": { "theme": theme } } }),
        }
    }
}

/// Light/dark theme names handed to the iframe-based comment widgets.
#[derive(Debug, Clone)]
pub struct WidgetThemes {
    pub utterances_light: String,
    pub utterances_dark: String,
    pub giscus_light: String,
    pub giscus_dark: String,
}

impl Default for WidgetThemes {
    fn default() -> Self {
        Self {
            utterances_light: "github-light".to_string(),
            utterances_dark: "github-dark".to_string(),
            giscus_light: "light".to_string(),
            giscus_dark: "dark".to_string(),
        }
    }
}

pub fn default_widgets(themes: &WidgetThemes) -> Vec<Box<dyn WidgetNotifier>> {
    vec![
        Box::new(Remark42),
        Box::new(Cusdis),
        Box::new(Utterances {
            light: themes.utterances_light.clone(),
            dark: themes.utterances_dark.clone(),
        }),
        Box::new(Giscus {
            light: themes.giscus_light.clone(),
            dark: themes.giscus_dark.clone(),
        }),
    ]
}

pub fn notify_widgets(
    widgets: &[Box<dyn WidgetNotifier>],
    presence: &dyn WidgetPresence,
    scheme: ColorScheme,
) -> Vec<WidgetNotification> {
    widgets
        .iter()
        .filter(|w| presence.has(w.marker()))
        .map(|w| w.message(scheme))
        .collect()
}

/// Highlight stylesheet states for a scheme: exactly one of the pair enabled.
pub fn highlight_stylesheets(scheme: ColorScheme) -> Vec<StylesheetState> {
    let dark = scheme == ColorScheme::Dark;
    vec![
        StylesheetState {
            id: LIGHT_HIGHLIGHT_ID,
            disabled: dark,
        },
        StylesheetState {
            id: DARK_HIGHLIGHT_ID,
            disabled: !dark,
        },
    ]
}

/// Resolves `requested`, else the stored preference, else the default.
///
/// Landing on the default scheme drops the stored preference so the page
/// follows the default again. An unrecognized value resets the same way and
/// leaves icon, stylesheets and widgets untouched.
pub fn apply(
    requested: Option<&str>,
    preference: &ThemePreference,
    env: &ThemeEnvironment,
    widgets: &[Box<dyn WidgetNotifier>],
    presence: &dyn WidgetPresence,
) -> ThemePlan {
    let default = env.default_scheme();
    let raw = requested
        .filter(|r| !r.is_empty())
        .or_else(|| preference.stored.as_deref().filter(|s| !s.is_empty()));
    let scheme = match raw {
        Some(r) => ColorScheme::parse(r),
        None => Some(default),
    };

    let Some(scheme) = scheme else {
        tracing::debug!(value = ?raw, "unrecognized color scheme; resetting");
        return ThemePlan {
            scheme: None,
            root_scheme: default,
            preference: PreferenceChange::Remove,
            icon: None,
            stylesheets: Vec::new(),
            notifications: Vec::new(),
        };
    };

    let preference = if scheme == default {
        PreferenceChange::Remove
    } else {
        PreferenceChange::Keep
    };

    ThemePlan {
        scheme: Some(scheme),
        root_scheme: scheme,
        preference,
        icon: Some(IconState {
            class: format!("iconfont {}", scheme.icon_class()),
            data: scheme.inverse(),
        }),
        stylesheets: highlight_stylesheets(scheme),
        notifications: notify_widgets(widgets, presence, scheme),
    }
}

/// The scheme a toggle click should persist, or `None` when the stored value
/// is unrecognized (the following [`apply`] then resets it).
pub fn toggle_target(
    preference: &ThemePreference,
    env: &ThemeEnvironment,
    icon_data: Option<&str>,
) -> Option<ColorScheme> {
    match preference.stored.as_deref() {
        Some(stored) => ColorScheme::parse(stored).map(ColorScheme::inverse),
        None => {
            if let Some(next) = icon_data.and_then(ColorScheme::parse) {
                return Some(next);
            }
            // No usable icon: flip whatever is showing now instead of
            // resetting to the default.
            let current = env
                .color_mode
                .as_deref()
                .and_then(ColorScheme::parse)
                .unwrap_or_else(|| env.default_scheme());
            Some(current.inverse())
        }
    }
}

/// A toggle click: persist the flipped scheme, then apply it.
pub fn toggle(
    preference: &ThemePreference,
    env: &ThemeEnvironment,
    icon_data: Option<&str>,
    widgets: &[Box<dyn WidgetNotifier>],
    presence: &dyn WidgetPresence,
) -> ThemePlan {
    let Some(next) = toggle_target(preference, env, icon_data) else {
        return apply(None, preference, env, widgets, presence);
    };
    let after = ThemePreference {
        stored: Some(next.to_string()),
    };
    let mut plan = apply(Some(next.as_str()), &after, env, widgets, presence);
    if plan.preference == PreferenceChange::Keep {
        plan.preference = PreferenceChange::Set(next);
    }
    plan
}

/// Icon class swap while the pointer is over the toggle button: from the
/// current scheme's icon to the icon of the scheme a click would select, and
/// back on leave. `None` when the icon's data is unrecognized.
pub fn hover_icon_swap(icon_data: &str, entering: bool) -> Option<(String, String)> {
    let target = ColorScheme::parse(icon_data)?;
    let current = target.inverse();
    if entering {
        Some((current.icon_class(), target.icon_class()))
    } else {
        Some((target.icon_class(), current.icon_class()))
    }
}

/// Key-value preference storage. Implementations never fail outward; an
/// unavailable backend behaves as empty and ignores writes.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

pub fn commit_preference(store: &mut dyn PreferenceStore, change: &PreferenceChange) {
    match change {
        PreferenceChange::Keep => {}
        PreferenceChange::Set(scheme) => store.set(PREFERENCE_KEY, scheme.as_str()),
        PreferenceChange::Remove => store.remove(PREFERENCE_KEY),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Preferences kept as a flat JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> BTreeMap<String, String> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(err) => {
                tracing::debug!(path = %self.path.display(), error = %err, "preference store unreadable");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|err| {
            tracing::debug!(path = %self.path.display(), error = %err, "preference store malformed");
            BTreeMap::new()
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) {
        let result = serde_json::to_string_pretty(values)
            .map_err(std::io::Error::other)
            .and_then(|text| {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                std::fs::write(&self.path, text)
            });
        if let Err(err) = result {
            tracing::debug!(path = %self.path.display(), error = %err, "preference store write ignored");
        }
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        let mut values = self.read_all();
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values);
    }

    fn remove(&mut self, key: &str) {
        let mut values = self.read_all();
        if values.remove(key).is_some() {
            self.write_all(&values);
        }
    }
}
