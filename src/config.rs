use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub exports_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub soffice_binary: PathBuf,
    pub automation_interpreter: PathBuf,
    pub automation_script: PathBuf,
    pub strategy_timeout: Duration,
    pub retention_age: Duration,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let exports_dir =
            base_dir.join(std::env::var("EXPORTS_FOLDER").unwrap_or_else(|_| "exports".to_string()));
        let uploads_dir =
            base_dir.join(std::env::var("UPLOADS_FOLDER").unwrap_or_else(|_| "uploads".to_string()));
        let templates_dir = base_dir
            .join(std::env::var("TEMPLATES_FOLDER").unwrap_or_else(|_| "templates".to_string()));

        let soffice_binary =
            PathBuf::from(std::env::var("SOFFICE_BINARY").unwrap_or_else(|_| "soffice".to_string()));
        let automation_interpreter = PathBuf::from(
            std::env::var("AUTOMATION_INTERPRETER").unwrap_or_else(|_| "python".to_string()),
        );
        let automation_script = base_dir.join(
            std::env::var("AUTOMATION_SCRIPT")
                .unwrap_or_else(|_| "python_scripts/excel_to_pdf.py".to_string()),
        );

        let strategy_timeout = Duration::from_secs(
            std::env::var("STRATEGY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
        );
        let retention_age = Duration::from_secs(
            std::env::var("RETENTION_AGE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        );

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        Ok(Self {
            exports_dir,
            uploads_dir,
            templates_dir,
            soffice_binary,
            automation_interpreter,
            automation_script,
            strategy_timeout,
            retention_age,
            host,
            port,
        })
    }
}
