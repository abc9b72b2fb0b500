use std::fmt;

use serde::{Deserialize, Serialize};

/// Detected kind of an uploaded file.
///
/// Every file starts as [`FileType::Unknown`] and is classified once by the
/// `InferFileType` checker. [`FileType::Failed`] means classification ran and
/// found nothing it recognizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    #[default]
    Unknown,
    Failed,

    Tex,
    Latex,
    Latex2e,
    PdfLatex,
    TexAms,
    TexMac,
    TexPriority,
    TexPriority2,
    TexInfo,
    PdfTex,

    TexAux,
    BibTex,
    Input,
    Pdf,
    Postscript,
    DosEps,
    PsFont,
    PsPc,
    Image,
    Tiff,
    Html,
    Dvi,
    Docx,
    Odf,
    Xlsx,
    Notebook,
    Uuencoded,
    Encrypted,
    Gzipped,
    Bzip2,
    Tar,
    Zip,
    Compressed,
    Readme,
    AlwaysIgnore,
    Ignore,
    Abs,
}

impl FileType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Failed => "unknown",
            Self::Tex => "TeX",
            Self::Latex => "LaTeX",
            Self::Latex2e => "LaTeX2e",
            Self::PdfLatex => "PDFLaTeX",
            Self::TexAms => "AMSTeX",
            Self::TexMac => "TeX +macros (harv,lanl..)",
            Self::TexPriority => "TeX (with \\end or \\bye)",
            Self::TexPriority2 => "TeX (with \\end or \\bye - not starting a line)",
            Self::TexInfo => "Texinfo",
            Self::PdfTex => "PDFTeX",
            Self::TexAux => "TeX auxiliary",
            Self::BibTex => "BibTeX",
            Self::Input => "Input for (La)TeX",
            Self::Pdf => "PDF",
            Self::Postscript => "Postscript",
            Self::DosEps => "DOS EPS Binary File",
            Self::PsFont => "Postscript Type 1 Font",
            Self::PsPc => "^D%! Postscript",
            Self::Image => "Image (gif/jpg etc)",
            Self::Tiff => "TIFF image",
            Self::Html => "HTML",
            Self::Dvi => "DVI",
            Self::Docx => "Microsoft DOCX",
            Self::Odf => "OpenDocument Format",
            Self::Xlsx => "Microsoft XLSX",
            Self::Notebook => "Mathematica Notebook",
            Self::Uuencoded => "UUencoded",
            Self::Encrypted => "Encrypted",
            Self::Gzipped => "GZIP-compressed",
            Self::Bzip2 => "BZIP2-compressed",
            Self::Tar => "TAR archive",
            Self::Zip => "ZIP-compressed",
            Self::Compressed => "UNIX-compressed",
            Self::Readme => "override",
            Self::AlwaysIgnore => "Always ignore",
            Self::Ignore => "user defined IGNORE",
            Self::Abs => "abstract",
        }
    }

    pub fn is_tex_type(self) -> bool {
        matches!(
            self,
            Self::Tex
                | Self::Latex
                | Self::Latex2e
                | Self::PdfLatex
                | Self::TexAms
                | Self::TexMac
                | Self::TexPriority
                | Self::TexPriority2
                | Self::TexInfo
                | Self::PdfTex
        )
    }

    pub fn is_image(self) -> bool {
        matches!(self, Self::Image | Self::Tiff)
    }

    /// Files with no bearing on what kind of submission the workspace is.
    pub fn is_ignorable(self) -> bool {
        matches!(self, Self::Ignore | Self::AlwaysIgnore)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inferred kind of a submission as a whole.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Unknown,
    Tex,
    Pdf,
    Postscript,
    Html,
    Invalid,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Tex => "tex",
            Self::Pdf => "pdf",
            Self::Postscript => "postscript",
            Self::Html => "html",
            Self::Invalid => "invalid",
        })
    }
}
