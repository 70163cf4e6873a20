//! Lazy `.include`/`.lib` resolution with a per-resolver library cache.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use spicenet_core::{Include, Model, SubcircuitTemplate};
use walkdir::WalkDir;

use crate::builder::element_from_card;
use crate::card::{Card, Directive, parse_card};
use crate::error::{Error, Location, Result};
use crate::tokenizer::Tokenizer;

/// File extensions scanned by [`Resolver::index`].
pub const LIBRARY_EXTENSIONS: &[&str] = &["lib", "mod", "sub", "cir", "sp", "spice", "inc"];

/// Definition name (upper case) to the file that defines it.
pub type LibraryIndex = IndexMap<String, PathBuf>;

/// A reference to a library file from a netlist or another library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRef {
    pub path: PathBuf,
    /// Section selected by `.lib path section`.
    pub section: Option<String>,
    /// The `.include`/`.lib` line that named the file.
    pub location: Location,
    pub text: String,
}

impl LibraryRef {
    /// Reference a whole file, as `.include` does.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let text = format!(".include \"{}\"", path.display());
        Self {
            path,
            section: None,
            location: Location::default(),
            text,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn at(mut self, location: Location, text: impl Into<String>) -> Self {
        self.location = location;
        self.text = text.into();
        self
    }

    /// The include entry recorded on the circuit for the solver.
    pub fn include(&self) -> Include {
        match &self.section {
            Some(section) => Include::section(&self.path, section),
            None => Include::new(&self.path),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    section: Option<String>,
    item: T,
}

impl<T> Entry<T> {
    fn in_section(&self, section: Option<&str>) -> bool {
        match (&self.section, section) {
            (None, None) => true,
            (Some(have), Some(want)) => have.eq_ignore_ascii_case(want),
            _ => false,
        }
    }
}

/// Models and subcircuit templates defined by one library file, including
/// those pulled in by its own `.include`/`.lib` lines.
#[derive(Debug, Clone, Default)]
pub struct Library {
    path: PathBuf,
    models: Vec<Entry<Model>>,
    subcircuits: Vec<Entry<SubcircuitTemplate>>,
}

impl Library {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find a model visible through `section` (`None` = outside any section).
    pub fn model(&self, name: &str, section: Option<&str>) -> Option<&Model> {
        self.models
            .iter()
            .filter(|e| e.in_section(section))
            .map(|e| &e.item)
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Find a subcircuit template visible through `section`.
    pub fn subcircuit(&self, name: &str, section: Option<&str>) -> Option<&SubcircuitTemplate> {
        self.subcircuits
            .iter()
            .filter(|e| e.in_section(section))
            .map(|e| &e.item)
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter().map(|e| &e.item)
    }

    pub fn subcircuits(&self) -> impl Iterator<Item = &SubcircuitTemplate> {
        self.subcircuits.iter().map(|e| &e.item)
    }

    /// Every definition name, sections included.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models
            .iter()
            .map(|e| e.item.name.as_str())
            .chain(self.subcircuits.iter().map(|e| e.item.name.as_str()))
    }

    /// Copy the definitions `other` exposes through `selected` into
    /// `section` of this library.
    fn merge(&mut self, other: &Library, selected: Option<&str>, section: &Option<String>) {
        for entry in other.models.iter().filter(|e| e.in_section(selected)) {
            self.models.push(Entry {
                section: section.clone(),
                item: entry.item.clone(),
            });
        }
        for entry in other.subcircuits.iter().filter(|e| e.in_section(selected)) {
            self.subcircuits.push(Entry {
                section: section.clone(),
                item: entry.item.clone(),
            });
        }
    }
}

/// Resolves library references relative to a root directory.
///
/// Parsed libraries are cached per resolver; `&Resolver` can be shared
/// across threads.
#[derive(Debug)]
pub struct Resolver {
    root: PathBuf,
    cache: RwLock<HashMap<PathBuf, Arc<Library>>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Resolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path as written in a netlist: relative to `base` (the
    /// referencing file's directory) when it exists there, else relative
    /// to the root.
    pub fn resolve_path(&self, path: &str, base: Option<&Path>) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        if let Some(base) = base {
            let candidate = base.join(path);
            if candidate.exists() {
                return candidate;
            }
        }
        let candidate = self.root.join(path);
        if candidate.exists() || base.is_none() {
            return candidate;
        }
        base.map(|b| b.join(path)).unwrap_or(candidate)
    }

    /// Number of libraries parsed so far.
    pub fn cached(&self) -> usize {
        match self.cache.read() {
            Ok(cache) => cache.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Load (or fetch from cache) the library a reference points at.
    pub fn load(&self, reference: &LibraryRef) -> Result<Arc<Library>> {
        self.load_guarded(reference, &mut Vec::new())
    }

    /// Search `includes` in order for a model.
    pub fn find_model(&self, name: &str, includes: &[LibraryRef]) -> Result<Option<Model>> {
        for include in includes {
            let library = self.load(include)?;
            if let Some(model) = library.model(name, include.section.as_deref()) {
                log::debug!("model {} resolved from {}", name, include.path.display());
                return Ok(Some(model.clone()));
            }
        }
        Ok(None)
    }

    /// Search `includes` in order for a subcircuit template.
    pub fn find_subcircuit(
        &self,
        name: &str,
        includes: &[LibraryRef],
    ) -> Result<Option<SubcircuitTemplate>> {
        for include in includes {
            let library = self.load(include)?;
            if let Some(template) = library.subcircuit(name, include.section.as_deref()) {
                log::debug!("subcircuit {} resolved from {}", name, include.path.display());
                return Ok(Some(template.clone()));
            }
        }
        Ok(None)
    }

    /// Walk the root for library files and map each definition name to
    /// the first file that defines it. Unparsable files are skipped.
    pub fn index(&self) -> Result<LibraryIndex> {
        let mut index = LibraryIndex::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|err| Error::Io {
                path: err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone()),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() || !is_library_file(entry.path()) {
                continue;
            }
            match self.load(&LibraryRef::new(entry.path())) {
                Ok(library) => {
                    for name in library.names() {
                        index
                            .entry(name.to_uppercase())
                            .or_insert_with(|| entry.path().to_path_buf());
                    }
                }
                Err(err) => log::warn!("skipping {}: {}", entry.path().display(), err),
            }
        }
        log::debug!("indexed {} definitions under {}", index.len(), self.root.display());
        Ok(index)
    }

    /// File defining `name`, found through [`index`](Self::index).
    pub fn locate(&self, name: &str) -> Result<Option<PathBuf>> {
        Ok(self.index()?.shift_remove(&name.to_uppercase()))
    }

    fn lookup(&self, path: &Path) -> Option<Arc<Library>> {
        let cache = match self.cache.read() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.get(path).cloned()
    }

    fn load_guarded(
        &self,
        reference: &LibraryRef,
        loading: &mut Vec<PathBuf>,
    ) -> Result<Arc<Library>> {
        if let Some(library) = self.lookup(&reference.path) {
            return Ok(library);
        }
        if !reference.path.is_file() {
            return Err(Error::LibraryNotFound {
                location: reference.location.clone(),
                path: reference.path.clone(),
                text: reference.text.clone(),
            });
        }

        loading.push(reference.path.clone());
        let parsed = self.parse_library(&reference.path, loading);
        loading.pop();
        let library = Arc::new(parsed?);
        log::debug!(
            "loaded library {} ({} models, {} subcircuits)",
            reference.path.display(),
            library.models.len(),
            library.subcircuits.len()
        );

        // Concurrent first loads parse the same file; the first insert wins.
        let mut cache = match self.cache.write() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(cache
            .entry(reference.path.clone())
            .or_insert(library)
            .clone())
    }

    fn parse_library(&self, path: &Path, loading: &mut Vec<PathBuf>) -> Result<Library> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent();

        let mut library = Library::new(path);
        let mut section: Option<String> = None;
        let mut open: Vec<(SubcircuitTemplate, Location, String)> = Vec::new();

        for line in Tokenizer::new(&text) {
            let line = line.map_err(|e| e.in_file(path))?;
            let location = Location::new(Some(path.to_path_buf()), line.line);
            let card = parse_card(&line).map_err(|e| e.in_file(path))?;

            match card {
                Card::Element(card) => match open.last_mut() {
                    Some((template, _, _)) => {
                        let element = element_from_card(card, |n| template.nodes.unify(n));
                        template.add_element(element);
                    }
                    None => log::debug!("{}: ignoring top-level element {}", location, card.name),
                },
                Card::Directive(Directive::Subckt {
                    name,
                    ports,
                    params,
                }) => {
                    let mut template = SubcircuitTemplate::new(name, ports);
                    template.params = params;
                    template.source = Some(path.to_path_buf());
                    open.push((template, location, line.text));
                }
                Card::Directive(Directive::Ends { .. }) => {
                    let Some((template, _, _)) = open.pop() else {
                        return Err(Error::malformed(&location, ".ends without .subckt", &line.text));
                    };
                    library.subcircuits.push(Entry {
                        section: section.clone(),
                        item: template,
                    });
                }
                Card::Directive(Directive::Model(mut model)) => {
                    model.source = Some(path.to_path_buf());
                    match open.last_mut() {
                        Some((template, _, _)) => template.models.push(model),
                        None => library.models.push(Entry {
                            section: section.clone(),
                            item: model,
                        }),
                    }
                }
                Card::Directive(Directive::LibSection { name }) => section = Some(name),
                Card::Directive(Directive::EndLib) => section = None,
                Card::Directive(Directive::Include { path: nested }) => {
                    let nested = LibraryRef::new(self.resolve_path(&nested, base))
                        .at(location, line.text);
                    self.merge_nested(&mut library, &nested, &section, loading)?;
                }
                Card::Directive(Directive::Lib {
                    path: nested,
                    section: selected,
                }) => {
                    let nested = LibraryRef::new(self.resolve_path(&nested, base))
                        .with_section(selected)
                        .at(location, line.text);
                    self.merge_nested(&mut library, &nested, &section, loading)?;
                }
                Card::Directive(Directive::End) => break,
                Card::Directive(_) | Card::Unrecognized(_) => {}
            }
        }

        if let Some((template, location, text)) = open.pop() {
            return Err(Error::malformed(
                &location,
                format!(".subckt {} has no matching .ends", template.name),
                &text,
            ));
        }
        Ok(library)
    }

    fn merge_nested(
        &self,
        library: &mut Library,
        nested: &LibraryRef,
        section: &Option<String>,
        loading: &mut Vec<PathBuf>,
    ) -> Result<()> {
        if loading.contains(&nested.path) {
            log::warn!(
                "{}: {} includes itself, skipping",
                nested.location,
                nested.path.display()
            );
            return Ok(());
        }
        let other = self.load_guarded(nested, loading)?;
        library.merge(&other, nested.section.as_deref(), section);
        Ok(())
    }
}

fn is_library_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            LIBRARY_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        path
    }

    const OPAMP_LIB: &str = "\
* op amp models
.model DCLAMP D(IS=1e-15)
.subckt LMV981 inp inn vcc vee out
R1 inp inn 10MEG
E1 out 0 inp inn 100k
D1 out vcc DCLAMP
.ends LMV981
";

    #[test]
    fn test_load_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "opamp.lib", OPAMP_LIB);
        let resolver = Resolver::new(dir.path());

        let library = resolver.load(&LibraryRef::new(&path)).unwrap();
        assert_eq!(library.models().count(), 1);
        let template = library.subcircuit("lmv981", None).unwrap();
        assert_eq!(template.arity(), 5);
        assert_eq!(template.elements.len(), 3);
        assert_eq!(template.source.as_deref(), Some(path.as_path()));

        let again = resolver.load(&LibraryRef::new(&path)).unwrap();
        assert!(Arc::ptr_eq(&library, &again));
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn test_missing_library() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Resolver::new(dir.path());
        let reference =
            LibraryRef::new(dir.path().join("nope.lib")).at(Location::line(3), ".include nope.lib");
        match resolver.find_model("D1N4148", &[reference]) {
            Err(Error::LibraryNotFound { location, .. }) => assert_eq!(location.line, 3),
            other => panic!("expected LibraryNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "corners.lib",
            ".model DX D(IS=1e-14)\n\
             .lib TT\n.model NCH NMOS(VTO=0.7)\n.endl TT\n\
             .lib FF\n.model NCH NMOS(VTO=0.6)\n.endl FF\n",
        );
        let resolver = Resolver::new(dir.path());

        let ff = LibraryRef::new(&path).with_section("ff");
        let model = resolver.find_model("nch", &[ff]).unwrap().unwrap();
        assert_eq!(model.params[0].value.as_number(), Some(0.6));

        let whole = LibraryRef::new(&path);
        assert!(resolver.find_model("NCH", &[whole.clone()]).unwrap().is_none());
        assert!(resolver.find_model("DX", &[whole]).unwrap().is_some());
    }

    #[test]
    fn test_nested_include_and_cycle() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "diodes.lib", ".model D1N4148 D(IS=2.52n)\n.include top.lib\n");
        let top = write(dir.path(), "top.lib", ".include diodes.lib\n");
        let resolver = Resolver::new(dir.path());

        let model = resolver
            .find_model("D1N4148", &[LibraryRef::new(&top)])
            .unwrap()
            .unwrap();
        assert_eq!(model.source.as_deref(), Some(dir.path().join("diodes.lib").as_path()));
    }

    #[test]
    fn test_index_and_locate() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("opamps")).unwrap();
        let path = write(&dir.path().join("opamps"), "lmv981.lib", OPAMP_LIB);
        write(dir.path(), "notes.txt", ".subckt IGNORED a b\n.ends\n");
        write(dir.path(), "broken.sp", ".subckt BROKEN a b\n");
        let resolver = Resolver::new(dir.path());

        let index = resolver.index().unwrap();
        assert_eq!(index.get("LMV981"), Some(&path));
        assert!(index.contains_key("DCLAMP"));
        assert!(!index.contains_key("IGNORED"));
        assert!(!index.contains_key("BROKEN"));

        assert_eq!(resolver.locate("lmv981").unwrap(), Some(path));
        assert_eq!(resolver.locate("nothing").unwrap(), None);
    }

    #[test]
    fn test_resolve_path_prefers_base() {
        let root = tempfile::tempdir().unwrap();
        let base = tempfile::tempdir().unwrap();
        write(root.path(), "shared.lib", "");
        write(base.path(), "local.lib", "");
        let resolver = Resolver::new(root.path());

        assert_eq!(
            resolver.resolve_path("local.lib", Some(base.path())),
            base.path().join("local.lib")
        );
        assert_eq!(
            resolver.resolve_path("shared.lib", Some(base.path())),
            root.path().join("shared.lib")
        );
        assert_eq!(
            resolver.resolve_path("missing.lib", Some(base.path())),
            base.path().join("missing.lib")
        );
    }
}
