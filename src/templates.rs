use std::sync::OnceLock;
use tera::Tera;

static TERA: OnceLock<Tera> = OnceLock::new();

// HTML pages live under pages/ so the name never collides with the
// spreadsheet templates directory.
pub fn get_tera() -> &'static Tera {
    TERA.get_or_init(|| {
        let mut tera = Tera::default();
        let page_dir = std::path::Path::new("pages");
        if page_dir.exists() {
            tera.add_template_files(
                std::fs::read_dir(page_dir)
                    .unwrap()
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().map_or(false, |ext| ext == "html"))
                    .map(|e| {
                        let name = e
                            .path()
                            .file_name()
                            .unwrap()
                            .to_str()
                            .unwrap()
                            .to_string();
                        (e.path(), Some(name))
                    }),
            )
            .expect("Failed to load page templates");
        }
        tera
    })
}
