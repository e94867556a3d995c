//! Access to the compiler output in the Hardhat artifacts layout:
//!
//! ```text
//! artifacts/
//! ├── build-info/<id>.json
//! └── contracts/Token.sol/
//!     ├── Token.json
//!     └── Token.dbg.json
//! ```

use {
    alloy::{
        dyn_abi::{DynSolValue, JsonAbiExt, Specifier},
        json_abi::JsonAbi,
        primitives::Bytes,
    },
    serde::{Deserialize, de::DeserializeOwned},
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    },
    tokio::fs,
};

const BUILD_INFO_DIR: &str = "build-info";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no artifact for contract {name:?} found in {root:?}")]
    NotFound { name: String, root: PathBuf },
    #[error(
        "contract name {name:?} is ambiguous, use one of the fully qualified names {candidates:?}"
    )]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },
    #[error("contract {0} has no bytecode, it may be abstract or an interface")]
    EmptyBytecode(String),
    #[error("contract {contract} must be linked against the libraries {libraries:?}")]
    MissingLibraries {
        contract: String,
        libraries: Vec<String>,
    },
    #[error("contract {0} has malformed bytecode")]
    InvalidBytecode(String),
    #[error("constructor arguments of {contract}: {reason}")]
    ConstructorArguments { contract: String, reason: String },
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON in {path:?}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Compiler output for a single contract.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: JsonAbi,
    /// Creation code as emitted by the compiler. Unlinked library references
    /// show up as `__$<hash>$__` placeholders, so this stays a string until
    /// [`Artifact::deployable_bytecode`] checks for them.
    bytecode: String,
    /// `source -> library -> offsets`
    #[serde(default)]
    link_references: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

impl Artifact {
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Returns the creation code, failing for contracts that can not be
    /// deployed as they are.
    pub fn deployable_bytecode(&self) -> Result<Bytes, Error> {
        let code = self.bytecode.trim_start_matches("0x");
        if code.is_empty() {
            return Err(Error::EmptyBytecode(self.fully_qualified_name()));
        }
        let libraries: Vec<_> = self
            .link_references
            .iter()
            .flat_map(|(source, libraries)| {
                libraries
                    .keys()
                    .map(move |library| format!("{source}:{library}"))
            })
            .collect();
        if !libraries.is_empty() {
            return Err(Error::MissingLibraries {
                contract: self.fully_qualified_name(),
                libraries,
            });
        }
        const_hex::decode(code)
            .map(Bytes::from)
            .map_err(|_| Error::InvalidBytecode(self.fully_qualified_name()))
    }

    /// ABI-encodes the constructor arguments. Every argument is given as a
    /// string and coerced into the type the constructor declares for it.
    pub fn encode_constructor_args(&self, args: &[String]) -> Result<Vec<u8>, Error> {
        let error = |reason: String| Error::ConstructorArguments {
            contract: self.fully_qualified_name(),
            reason,
        };

        let Some(constructor) = &self.abi.constructor else {
            if args.is_empty() {
                return Ok(Vec::new());
            }
            return Err(error(format!(
                "contract has no constructor but {} arguments were given",
                args.len()
            )));
        };
        if constructor.inputs.len() != args.len() {
            return Err(error(format!(
                "expected {} arguments, got {}",
                constructor.inputs.len(),
                args.len()
            )));
        }

        let values = constructor
            .inputs
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                let ty = param
                    .resolve()
                    .map_err(|err| error(format!("parameter {:?}: {err}", param.name)))?;
                ty.coerce_str(arg).map_err(|err| {
                    error(format!(
                        "invalid value {arg:?} for parameter {:?} of type {}: {err}",
                        param.name, param.ty
                    ))
                })
            })
            .collect::<Result<Vec<DynSolValue>, _>>()?;

        constructor
            .abi_encode_input(&values)
            .map_err(|err| error(err.to_string()))
    }
}

/// Compiler input and version information shared by all contracts of one
/// compilation.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Short version, e.g. `0.8.24`.
    pub solc_version: String,
    /// Version including the commit, e.g. `0.8.24+commit.e11b9ed9`.
    pub solc_long_version: String,
    /// Standard JSON input the contracts were compiled from.
    pub input: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

/// Artifacts directory of a compiled project.
#[derive(Clone, Debug)]
pub struct Artifacts {
    root: PathBuf,
}

impl Artifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn read_artifact(&self, name: &str) -> Result<Artifact, Error> {
        read_json(&self.artifact_path(name).await?).await
    }

    /// Reads the build info the artifact was produced by, following the
    /// pointer in the `.dbg.json` file next to it.
    pub async fn read_build_info(&self, artifact: &Artifact) -> Result<BuildInfo, Error> {
        let dir = self.root.join(&artifact.source_name);
        let debug: DebugFile =
            read_json(&dir.join(format!("{}.dbg.json", artifact.contract_name))).await?;
        read_json(&dir.join(debug.build_info)).await
    }

    async fn artifact_path(&self, name: &str) -> Result<PathBuf, Error> {
        if let Some((source, contract)) = name.rsplit_once(':') {
            let path = self.root.join(source).join(format!("{contract}.json"));
            let is_file = fs::metadata(&path)
                .await
                .is_ok_and(|metadata| metadata.is_file());
            if !is_file {
                return Err(self.not_found(name));
            }
            return Ok(path);
        }

        let mut candidates = self.find_artifacts(name).await?;
        match candidates.len() {
            0 => Err(self.not_found(name)),
            1 => Ok(candidates.remove(0)),
            _ => {
                let mut candidates: Vec<_> = candidates
                    .iter()
                    .filter_map(|path| {
                        let source = path.parent()?.strip_prefix(&self.root).ok()?;
                        Some(format!("{}:{name}", source.to_string_lossy()))
                    })
                    .collect();
                candidates.sort();
                Err(Error::Ambiguous {
                    name: name.to_string(),
                    candidates,
                })
            }
        }
    }

    /// Collects `<root>/**/<source>.sol/<name>.json` files.
    async fn find_artifacts(&self, name: &str) -> Result<Vec<PathBuf>, Error> {
        let file_name = format!("{name}.json");
        let mut found = Vec::new();
        let mut dirs = vec![self.root.clone()];
        while let Some(dir) = dirs.pop() {
            let io_error = |source| Error::Io {
                path: dir.clone(),
                source,
            };
            let mut entries = fs::read_dir(&dir).await.map_err(io_error)?;
            while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
                let path = entry.path();
                if entry.file_type().await.map_err(io_error)?.is_dir() {
                    if entry.file_name() != BUILD_INFO_DIR {
                        dirs.push(path);
                    }
                } else if entry.file_name() == file_name.as_str()
                    && dir.extension().is_some_and(|ext| ext == "sol")
                {
                    found.push(path);
                }
            }
        }
        Ok(found)
    }

    fn not_found(&self, name: &str) -> Error {
        Error::NotFound {
            name: name.to_string(),
            root: self.root.clone(),
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let data = fs::read_to_string(path).await.map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}
