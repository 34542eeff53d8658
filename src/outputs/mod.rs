//! Output generation modules for JSON, HTML, and SEO metadata.
//!
//! # Submodules
//!
//! - [`json`]: Writes article pages and SEO files for API consumption
//! - [`html`]: Renders a category page as a standalone HTML document
//! - [`seo`]: Builds JSON-LD structured data, breadcrumbs, and sitemap entries
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! ├── all/
//! │   ├── page-1.json
//! │   ├── structured-data.json
//! │   ├── breadcrumb.json
//! │   └── sitemap.json
//! └── technology/
//!     └── ...
//! ```

pub mod html;
pub mod json;
pub mod seo;
