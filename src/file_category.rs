/// File categorization by extension.
///
/// This module maps file extensions (with their leading dot, e.g. `".jpg"`)
/// to the fixed set of categories files are sorted into. Lookups are
/// case-insensitive and anything unmapped falls back to [`Category::Others`].
///
/// # Examples
///
/// ```
/// use order::file_category::{Category, ExtensionTable};
///
/// let table = ExtensionTable::default();
/// assert_eq!(table.classify(".jpg"), Category::Images);
/// assert_eq!(table.classify(".MP4"), Category::Videos);
/// assert_eq!(table.classify(".xyz"), Category::Others);
/// ```
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::config::ConfigError;

/// A sorting bucket.
///
/// Variants are declared in display rank order; the derived `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Images,
    Videos,
    Music,
    Documents,
    Archives,
    ThreeDObjects,
    CadFiles,
    Code,
    Executables,
    DataFiles,
    VirtualMachines,
    /// Catch-all for anything the table does not map.
    Others,
}

impl Category {
    /// Every category, in display rank order.
    pub const ALL: [Category; 12] = [
        Category::Images,
        Category::Videos,
        Category::Music,
        Category::Documents,
        Category::Archives,
        Category::ThreeDObjects,
        Category::CadFiles,
        Category::Code,
        Category::Executables,
        Category::DataFiles,
        Category::VirtualMachines,
        Category::Others,
    ];

    /// The 1-based display rank, used only to prefix folder names.
    pub fn rank(&self) -> usize {
        *self as usize + 1
    }

    /// The bare category label, also the key used in config files.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Images => "Images",
            Category::Videos => "Videos",
            Category::Music => "Music",
            Category::Documents => "Documents",
            Category::Archives => "Archives",
            Category::ThreeDObjects => "3D_Objects",
            Category::CadFiles => "CAD_Files",
            Category::Code => "Code",
            Category::Executables => "Executables",
            Category::DataFiles => "Data_Files",
            Category::VirtualMachines => "Virtual_Machines",
            Category::Others => "Others",
        }
    }

    /// Returns the subfolder name for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use order::file_category::Category;
    ///
    /// assert_eq!(Category::Images.dir_name(), "1. Images");
    /// assert_eq!(Category::Others.dir_name(), "12. Others");
    /// ```
    pub fn dir_name(&self) -> String {
        format!("{}. {}", self.rank(), self.label())
    }

    /// Looks a category up by its label, ignoring case.
    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(label))
    }

    /// Extensions mapped to this category out of the box.
    fn default_extensions(&self) -> &'static [&'static str] {
        match self {
            Category::Images => &[
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".psd", ".ai", ".svg", ".webp",
                ".heic", ".raw",
            ],
            Category::Videos => &[
                ".mp4", ".avi", ".mov", ".mkv", ".flv", ".wmv", ".m4v", ".mpg", ".mpeg", ".vob",
            ],
            Category::Music => &[
                ".mp3", ".wav", ".aac", ".flac", ".ogg", ".m4a", ".wma", ".alac",
            ],
            Category::Documents => &[
                ".pdf", ".docx", ".pptx", ".xlsx", ".txt", ".md", ".odt", ".rtf", ".doc", ".ppt",
                ".xls", ".epub", ".mobi",
            ],
            Category::Archives => &[".zip", ".rar", ".tar", ".gz", ".7z", ".bz2", ".xz", ".iso"],
            Category::ThreeDObjects => &[
                ".obj", ".stl", ".fbx", ".blend", ".dae", ".3ds", ".max", ".skp", ".c4d", ".ma",
            ],
            Category::CadFiles => &[
                ".dwg", ".dxf", ".rvt", ".ipt", ".iam", ".3dm", ".sldprt", ".sldasm",
            ],
            Category::Code => &[
                ".py", ".js", ".html", ".css", ".java", ".cpp", ".c", ".cs", ".sh", ".bat", ".php",
                ".rb", ".go", ".lua",
            ],
            Category::Executables => &[
                ".exe", ".msi", ".bin", ".app", ".apk", ".dmg", ".deb", ".pkg", ".rpm",
            ],
            Category::DataFiles => &[
                ".csv", ".json", ".xml", ".yaml", ".sql", ".db", ".hdf5", ".parquet", ".sav",
            ],
            Category::VirtualMachines => &[".vmdk", ".vmx", ".ova", ".ovf", ".vdi", ".vhd", ".vhdx"],
            Category::Others => &[],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalizes an extension to the table's key form: lowercase, leading dot.
fn normalize_extension(ext: &str) -> String {
    let lower = ext.trim().to_lowercase();
    if lower.is_empty() || lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// Returns the lowercase extension of a path, including the dot.
///
/// Only the final suffix counts (`"b.mp4.part"` gives `".part"`), and dot
/// files such as `".bashrc"` have no extension.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Maps extensions to categories.
///
/// Built once at startup and shared read-only by every trigger. Keys are
/// unique: an extension belongs to exactly one category.
#[derive(Debug, Clone)]
pub struct ExtensionTable {
    extension_map: HashMap<String, Category>,
}

impl ExtensionTable {
    /// Creates a table holding the standard mappings.
    pub fn new() -> Self {
        let extension_map = Category::ALL
            .into_iter()
            .flat_map(|category| {
                category
                    .default_extensions()
                    .iter()
                    .map(move |ext| (ext.to_string(), category))
            })
            .collect();
        Self { extension_map }
    }

    /// Builds a table from the defaults, replacing the extension list of
    /// every category present in `overrides`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateExtension`] if the resulting table
    /// would map one extension to two categories, and
    /// [`ConfigError::ConfigInvalid`] if an override targets `Others`.
    pub fn with_overrides(
        overrides: &HashMap<Category, Vec<String>>,
    ) -> Result<Self, ConfigError> {
        let mut table = Self {
            extension_map: HashMap::new(),
        };

        for category in Category::ALL {
            match overrides.get(&category) {
                Some(_) if category == Category::Others => {
                    return Err(ConfigError::ConfigInvalid(
                        "the Others category is a catch-all and takes no extensions".to_string(),
                    ));
                }
                Some(extensions) => {
                    for ext in extensions {
                        table.insert(ext, category)?;
                    }
                }
                None => {
                    for ext in category.default_extensions() {
                        table.insert(ext, category)?;
                    }
                }
            }
        }

        Ok(table)
    }

    fn insert(&mut self, ext: &str, category: Category) -> Result<(), ConfigError> {
        let key = normalize_extension(ext);
        if key.is_empty() {
            return Err(ConfigError::ConfigInvalid(format!(
                "empty extension listed under {}",
                category
            )));
        }
        if let Some(existing) = self.extension_map.get(&key)
            && *existing != category
        {
            return Err(ConfigError::DuplicateExtension {
                extension: key,
                first: *existing,
                second: category,
            });
        }
        self.extension_map.insert(key, category);
        Ok(())
    }

    /// Maps an extension to its category.
    ///
    /// Total over all inputs: case is ignored and anything unmapped,
    /// including the empty string, yields [`Category::Others`].
    ///
    /// # Examples
    ///
    /// ```
    /// use order::file_category::{Category, ExtensionTable};
    ///
    /// let table = ExtensionTable::default();
    /// assert_eq!(table.classify(".PDF"), Category::Documents);
    /// assert_eq!(table.classify(""), Category::Others);
    /// ```
    pub fn classify(&self, extension: &str) -> Category {
        self.extension_map
            .get(&extension.to_lowercase())
            .copied()
            .unwrap_or(Category::Others)
    }

    /// Classifies a file by the extension of its name.
    pub fn classify_path(&self, path: &Path) -> Category {
        self.classify(&extension_of(path))
    }

    /// Extensions mapped to `category`, sorted.
    pub fn extensions_for(&self, category: Category) -> Vec<&str> {
        let mut extensions: Vec<&str> = self
            .extension_map
            .iter()
            .filter(|(_, mapped)| **mapped == category)
            .map(|(ext, _)| ext.as_str())
            .collect();
        extensions.sort_unstable();
        extensions
    }

    pub fn len(&self) -> usize {
        self.extension_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extension_map.is_empty()
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_dir_names() {
        assert_eq!(Category::Images.dir_name(), "1. Images");
        assert_eq!(Category::Videos.dir_name(), "2. Videos");
        assert_eq!(Category::Music.dir_name(), "3. Music");
        assert_eq!(Category::ThreeDObjects.dir_name(), "6. 3D_Objects");
        assert_eq!(Category::CadFiles.dir_name(), "7. CAD_Files");
        assert_eq!(Category::DataFiles.dir_name(), "10. Data_Files");
        assert_eq!(Category::VirtualMachines.dir_name(), "11. Virtual_Machines");
        assert_eq!(Category::Others.dir_name(), "12. Others");
    }

    #[test]
    fn test_rank_follows_declaration_order() {
        for (index, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.rank(), index + 1);
        }
        assert!(Category::Images < Category::Others);
    }

    #[test]
    fn test_from_label() {
        assert_eq!(Category::from_label("Images"), Some(Category::Images));
        assert_eq!(Category::from_label("3d_objects"), Some(Category::ThreeDObjects));
        assert_eq!(Category::from_label("Fonts"), None);
    }

    #[test]
    fn test_every_default_extension_round_trips_case_insensitively() {
        let table = ExtensionTable::default();
        for category in Category::ALL {
            for ext in category.default_extensions() {
                assert_eq!(table.classify(ext), category, "{}", ext);
                assert_eq!(table.classify(&ext.to_uppercase()), category, "{}", ext);
            }
        }
    }

    #[test]
    fn test_default_lists_are_disjoint() {
        let total: usize = Category::ALL
            .iter()
            .map(|category| category.default_extensions().len())
            .sum();
        assert_eq!(ExtensionTable::default().len(), total);
        assert!(ExtensionTable::with_overrides(&HashMap::new()).is_ok());
    }

    #[test]
    fn test_unknown_extensions_fall_back_to_others() {
        let table = ExtensionTable::default();
        assert_eq!(table.classify(".xyz"), Category::Others);
        assert_eq!(table.classify(""), Category::Others);
        assert_eq!(table.classify("jpg"), Category::Others);
        assert_eq!(table.classify(".part"), Category::Others);
    }

    #[test]
    fn test_classify_path_uses_final_suffix() {
        let table = ExtensionTable::default();
        assert_eq!(table.classify_path(Path::new("/d/a.JPG")), Category::Images);
        assert_eq!(table.classify_path(Path::new("/d/x.tar.gz")), Category::Archives);
        assert_eq!(table.classify_path(Path::new("/d/.bashrc")), Category::Others);
        assert_eq!(table.classify_path(Path::new("/d/README")), Category::Others);
    }

    #[test]
    fn test_overrides_replace_category_list() {
        let mut overrides = HashMap::new();
        overrides.insert(Category::Images, vec!["PNG".to_string(), ".avif".to_string()]);
        let table = ExtensionTable::with_overrides(&overrides).unwrap();

        assert_eq!(table.classify(".png"), Category::Images);
        assert_eq!(table.classify(".avif"), Category::Images);
        assert_eq!(table.classify(".jpg"), Category::Others);
        assert_eq!(table.extensions_for(Category::Images), vec![".avif", ".png"]);
    }

    #[test]
    fn test_duplicate_extension_is_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert(Category::Code, vec![".mp4".to_string()]);
        let err = ExtensionTable::with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateExtension { .. }));
    }

    #[test]
    fn test_others_cannot_take_extensions() {
        let mut overrides = HashMap::new();
        overrides.insert(Category::Others, vec![".foo".to_string()]);
        assert!(ExtensionTable::with_overrides(&overrides).is_err());
    }
}
