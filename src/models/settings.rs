use serde::{Deserialize, Serialize};

/// Where the gallery control bar is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlBarPosition {
    Top,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharePlatforms {
    pub facebook: bool,
    pub twitter: bool,
    pub whatsapp: bool,
    pub email: bool,
}

impl Default for SharePlatforms {
    fn default() -> Self {
        Self {
            facebook: true,
            twitter: true,
            whatsapp: true,
            email: true,
        }
    }
}

/// Fully resolved sharing settings for a folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderSettings {
    pub show_share_buttons: bool,
    pub platforms: SharePlatforms,
    pub show_download_button: bool,
    pub show_copy_link_button: bool,
    pub control_bar_position: ControlBarPosition,
}

impl Default for FolderSettings {
    fn default() -> Self {
        Self {
            show_share_buttons: true,
            platforms: SharePlatforms::default(),
            show_download_button: true,
            show_copy_link_button: true,
            control_bar_position: ControlBarPosition::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSharePlatforms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<bool>,
}

/// Settings document as persisted. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFolderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_share_buttons: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<StoredSharePlatforms>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_download_button: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_copy_link_button: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_bar_position: Option<ControlBarPosition>,
}

impl StoredFolderSettings {
    /// Overlay the fields present in `patch` onto `self`.
    pub fn apply(&mut self, patch: StoredFolderSettings) {
        if patch.show_share_buttons.is_some() {
            self.show_share_buttons = patch.show_share_buttons;
        }
        if let Some(p) = patch.platforms {
            let current = self.platforms.get_or_insert_with(Default::default);
            current.facebook = p.facebook.or(current.facebook);
            current.twitter = p.twitter.or(current.twitter);
            current.whatsapp = p.whatsapp.or(current.whatsapp);
            current.email = p.email.or(current.email);
        }
        if patch.show_download_button.is_some() {
            self.show_download_button = patch.show_download_button;
        }
        if patch.show_copy_link_button.is_some() {
            self.show_copy_link_button = patch.show_copy_link_button;
        }
        if patch.control_bar_position.is_some() {
            self.control_bar_position = patch.control_bar_position;
        }
    }
}

impl From<StoredFolderSettings> for FolderSettings {
    fn from(stored: StoredFolderSettings) -> Self {
        let defaults = FolderSettings::default();
        let platforms = stored.platforms.unwrap_or_default();

        Self {
            show_share_buttons: stored
                .show_share_buttons
                .unwrap_or(defaults.show_share_buttons),
            platforms: SharePlatforms {
                facebook: platforms.facebook.unwrap_or(defaults.platforms.facebook),
                twitter: platforms.twitter.unwrap_or(defaults.platforms.twitter),
                whatsapp: platforms.whatsapp.unwrap_or(defaults.platforms.whatsapp),
                email: platforms.email.unwrap_or(defaults.platforms.email),
            },
            show_download_button: stored
                .show_download_button
                .unwrap_or(defaults.show_download_button),
            show_copy_link_button: stored
                .show_copy_link_button
                .unwrap_or(defaults.show_copy_link_button),
            control_bar_position: stored
                .control_bar_position
                .unwrap_or(defaults.control_bar_position),
        }
    }
}
