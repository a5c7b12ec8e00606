use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    De,
    Es,
    Fr,
}

impl Lang {
    pub const ALL: [Lang; 4] = [Lang::En, Lang::De, Lang::Es, Lang::Fr];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
            Self::Es => "es",
            Self::Fr => "fr",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str() == input.trim())
    }

    /// Unknown or missing codes fall back to English.
    pub fn from_code(input: Option<&str>) -> Self {
        input.and_then(Self::parse).unwrap_or_default()
    }

    /// Picks a language from the first two letters of an `Accept-Language`
    /// header value.
    pub fn negotiate(accept_language: Option<&str>) -> Self {
        let Some(header) = accept_language else {
            return Self::En;
        };
        let prefix: String = header.chars().take(2).collect::<String>().to_ascii_lowercase();
        Self::parse(&prefix).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    AlreadyInstalled,
    RuntimeVersion,
    UnknownAction,
    InvalidBranch,
    ZipMissing,
    DirNotWritable,
    FileOpenErr,
    CurlErr,
    DownloadFail,
    DownloadOk,
    ZipNotFound,
    UnzipFail,
    MoveFail,
    MoveFilesKept,
    ExtractDirErr,
    ExtractOk,
    DeleteFail,
}

impl MessageKey {
    pub fn code(self) -> &'static str {
        match self {
            Self::AlreadyInstalled => "already_installed",
            Self::RuntimeVersion => "runtime_version",
            Self::UnknownAction => "unknown_action",
            Self::InvalidBranch => "invalid_branch",
            Self::ZipMissing => "zip_missing",
            Self::DirNotWritable => "dir_not_writable",
            Self::FileOpenErr => "file_open_err",
            Self::CurlErr => "curl_err",
            Self::DownloadFail => "download_fail",
            Self::DownloadOk => "download_ok",
            Self::ZipNotFound => "zip_not_found",
            Self::UnzipFail => "unzip_fail",
            Self::MoveFail => "move_fail",
            Self::MoveFilesKept => "move_files_kept",
            Self::ExtractDirErr => "extract_dir_err",
            Self::ExtractOk => "extract_ok",
            Self::DeleteFail => "delete_fail",
        }
    }

    /// Message text in `lang`. `{package}` is replaced with the package's
    /// display name by [`render`].
    pub fn text(self, lang: Lang) -> &'static str {
        match lang {
            Lang::En => english(self),
            Lang::De => german(self),
            Lang::Es => spanish(self),
            Lang::Fr => french(self),
        }
    }

    pub fn render(self, lang: Lang, package: &str) -> String {
        self.text(lang).replace("{package}", package)
    }
}

fn english(key: MessageKey) -> &'static str {
    match key {
        MessageKey::AlreadyInstalled => "{package} is already installed.",
        MessageKey::RuntimeVersion => "Runtime version requirement not met: ",
        MessageKey::UnknownAction => "Unknown action: ",
        MessageKey::InvalidBranch => "Invalid branch selected.",
        MessageKey::ZipMissing => "ZIP extraction support is missing from this build.",
        MessageKey::DirNotWritable => {
            "The current directory is not writable. Please check permissions."
        }
        MessageKey::FileOpenErr => "Could not open file for writing: ",
        MessageKey::CurlErr => "Download error: ",
        MessageKey::DownloadFail => "Download failed or file is corrupt.",
        MessageKey::DownloadOk => "Download successful.",
        MessageKey::ZipNotFound => "ZIP file not found. Please restart.",
        MessageKey::UnzipFail => "Failed to unzip the archive.",
        MessageKey::MoveFail => "Could not move file to root: ",
        MessageKey::MoveFilesKept => "Some files were left in the extracted directory: ",
        MessageKey::ExtractDirErr => "Extracted directory not found.",
        MessageKey::ExtractOk => "{package} extracted successfully.",
        MessageKey::DeleteFail => "Could not delete file: ",
    }
}

fn german(key: MessageKey) -> &'static str {
    match key {
        MessageKey::AlreadyInstalled => "{package} ist bereits installiert.",
        MessageKey::RuntimeVersion => "Mindestversion der Laufzeitumgebung nicht erfüllt: ",
        MessageKey::UnknownAction => "Unbekannte Aktion: ",
        MessageKey::InvalidBranch => "Ungültiger Branch ausgewählt.",
        MessageKey::ZipMissing => "ZIP-Unterstützung fehlt in diesem Build.",
        MessageKey::DirNotWritable => {
            "Das aktuelle Verzeichnis ist nicht beschreibbar. Bitte Berechtigungen prüfen."
        }
        MessageKey::FileOpenErr => "Konnte Datei nicht zum Schreiben öffnen: ",
        MessageKey::CurlErr => "Download-Fehler: ",
        MessageKey::DownloadFail => "Download fehlgeschlagen oder Datei beschädigt.",
        MessageKey::DownloadOk => "Download erfolgreich.",
        MessageKey::ZipNotFound => "ZIP-Datei nicht gefunden. Bitte neu starten.",
        MessageKey::UnzipFail => "Entpacken des Archivs fehlgeschlagen.",
        MessageKey::MoveFail => "Konnte Datei nicht verschieben: ",
        MessageKey::MoveFilesKept => "Einige Dateien verbleiben im entpackten Verzeichnis: ",
        MessageKey::ExtractDirErr => "Entpacktes Verzeichnis nicht gefunden.",
        MessageKey::ExtractOk => "{package} erfolgreich entpackt.",
        MessageKey::DeleteFail => "Konnte Datei nicht löschen: ",
    }
}

fn spanish(key: MessageKey) -> &'static str {
    match key {
        MessageKey::AlreadyInstalled => "{package} ya está instalado.",
        MessageKey::RuntimeVersion => "No se cumple la versión mínima del entorno: ",
        MessageKey::UnknownAction => "Acción desconocida: ",
        MessageKey::InvalidBranch => "Rama seleccionada inválida.",
        MessageKey::ZipMissing => "Esta compilación no admite la extracción de ZIP.",
        MessageKey::DirNotWritable => {
            "El directorio actual no es escribible. Por favor verifique permisos."
        }
        MessageKey::FileOpenErr => "No se pudo abrir el archivo para escribir: ",
        MessageKey::CurlErr => "Error de descarga: ",
        MessageKey::DownloadFail => "La descarga falló o el archivo está corrupto.",
        MessageKey::DownloadOk => "Descarga exitosa.",
        MessageKey::ZipNotFound => "Archivo ZIP no encontrado. Por favor reinicie.",
        MessageKey::UnzipFail => "Fallo al descomprimir el archivo.",
        MessageKey::MoveFail => "No se pudo mover el archivo a la raíz: ",
        MessageKey::MoveFilesKept => "Algunos archivos quedaron en el directorio extraído: ",
        MessageKey::ExtractDirErr => "Directorio extraído no encontrado.",
        MessageKey::ExtractOk => "{package} extraído con éxito.",
        MessageKey::DeleteFail => "No se pudo eliminar el archivo: ",
    }
}

fn french(key: MessageKey) -> &'static str {
    match key {
        MessageKey::AlreadyInstalled => "{package} est déjà installé.",
        MessageKey::RuntimeVersion => "Version minimale de l'environnement non satisfaite : ",
        MessageKey::UnknownAction => "Action inconnue : ",
        MessageKey::InvalidBranch => "Branche sélectionnée invalide.",
        MessageKey::ZipMissing => "La prise en charge ZIP est absente de cette version.",
        MessageKey::DirNotWritable => {
            "Le répertoire actuel n'est pas accessible en écriture. Veuillez vérifier les permissions."
        }
        MessageKey::FileOpenErr => "Impossible d'ouvrir le fichier pour l'écriture : ",
        MessageKey::CurlErr => "Erreur de téléchargement : ",
        MessageKey::DownloadFail => "Le téléchargement a échoué ou le fichier est corrompu.",
        MessageKey::DownloadOk => "Téléchargement réussi.",
        MessageKey::ZipNotFound => "Fichier ZIP introuvable. Veuillez recommencer.",
        MessageKey::UnzipFail => "Échec de la décompression de l'archive.",
        MessageKey::MoveFail => "Impossible de déplacer le fichier vers la racine : ",
        MessageKey::MoveFilesKept => "Certains fichiers sont restés dans le répertoire extrait : ",
        MessageKey::ExtractDirErr => "Répertoire extrait introuvable.",
        MessageKey::ExtractOk => "{package} extrait avec succès.",
        MessageKey::DeleteFail => "Impossible de supprimer le fichier : ",
    }
}

/// A user-facing failure. Travels inside `anyhow::Error` and is localized at
/// the action boundary; its `Display` is the English text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub key: MessageKey,
    pub detail: Option<String>,
}

impl Failure {
    pub fn new(key: MessageKey) -> Self {
        Self { key, detail: None }
    }

    pub fn with_detail(key: MessageKey, detail: impl Into<String>) -> Self {
        Self {
            key,
            detail: Some(detail.into()),
        }
    }

    pub fn localize(&self, lang: Lang, package: &str) -> String {
        let mut message = self.key.render(lang, package);
        if let Some(detail) = self.detail.as_deref() {
            // only keys ending in a separator take a suffix
            if message.ends_with(": ") {
                message.push_str(detail);
            }
        }
        message
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.localize(Lang::En, "package"))
    }
}

impl std::error::Error for Failure {}
