use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_UPLOAD_URL: &str = "https://speed.cloudflare.com/__up";
pub const DEFAULT_DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down?bytes=20000000";

#[derive(Debug, Clone)]
pub struct Settings {
    pub upload_size_bytes: u64,
    pub download_budget_bytes: u64,
    pub upload_url: String,
    pub download_url: String,
    pub connect_timeout: Duration,
    pub transfer_timeout: Duration,
    pub upload_chunk_bytes: usize,
    pub csv_delimiter: char,
    pub results_file: Option<PathBuf>,
    pub poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upload_size_bytes: 1_000_000,
            download_budget_bytes: 1_000_000,
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            transfer_timeout: Duration::from_secs(120),
            upload_chunk_bytes: 1_000_000,
            csv_delimiter: ',',
            results_file: None,
            poll_interval: Duration::from_millis(100),
        }
    }
}

const SIZE_STEP: u64 = 500_000;
const MIN_SIZE: u64 = 500_000;
const MAX_UPLOAD: u64 = 250_000_000;
const MAX_DOWNLOAD: u64 = 500_000_000;

impl Settings {
    pub fn upload_size_mb(&self) -> f64 {
        self.upload_size_bytes as f64 / 1_000_000.0
    }

    pub fn download_budget_mb(&self) -> f64 {
        self.download_budget_bytes as f64 / 1_000_000.0
    }

    pub fn increase(&mut self, field: SettingsField) {
        match field {
            SettingsField::UploadSize => {
                self.upload_size_bytes = (self.upload_size_bytes + SIZE_STEP).min(MAX_UPLOAD);
            }
            SettingsField::DownloadBudget => {
                self.download_budget_bytes = (self.download_budget_bytes + SIZE_STEP).min(MAX_DOWNLOAD);
            }
        }
    }

    pub fn decrease(&mut self, field: SettingsField) {
        match field {
            SettingsField::UploadSize => {
                self.upload_size_bytes = self.upload_size_bytes.saturating_sub(SIZE_STEP).max(MIN_SIZE);
            }
            SettingsField::DownloadBudget => {
                self.download_budget_bytes = self.download_budget_bytes.saturating_sub(SIZE_STEP).max(MIN_SIZE);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    UploadSize,
    DownloadBudget,
}

impl SettingsField {
    pub fn next(self) -> Self {
        match self {
            SettingsField::UploadSize => SettingsField::DownloadBudget,
            SettingsField::DownloadBudget => SettingsField::UploadSize,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            SettingsField::UploadSize => SettingsField::DownloadBudget,
            SettingsField::DownloadBudget => SettingsField::UploadSize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_stepping_is_clamped() {
        let mut settings = Settings::default();
        settings.decrease(SettingsField::UploadSize);
        settings.decrease(SettingsField::UploadSize);
        assert_eq!(settings.upload_size_bytes, MIN_SIZE);

        settings.download_budget_bytes = MAX_DOWNLOAD - 1;
        settings.increase(SettingsField::DownloadBudget);
        assert_eq!(settings.download_budget_bytes, MAX_DOWNLOAD);
    }

    #[test]
    fn test_field_cycle() {
        assert_eq!(SettingsField::UploadSize.next(), SettingsField::DownloadBudget);
        assert_eq!(SettingsField::DownloadBudget.prev(), SettingsField::UploadSize);
        assert_eq!(SettingsField::UploadSize.prev(), SettingsField::DownloadBudget);
    }
}
