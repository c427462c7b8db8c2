//! Content Extraction
//!
//! Pure functions turning accumulated model output into domain objects.
//! Model output is loosely formatted, so every extractor is a chain of
//! ordered strategies: the first one that produces a result wins and a
//! documented default closes the chain.
//!
//! ## Extractors
//!
//! - [`extract_structure`]: `<wiki_structure>` XML block to [`StructurePlan`](crate::types::StructurePlan)
//! - [`clean_markdown_fence`]: strips the fence models wrap page Markdown in
//! - [`extract_plan_list`]: numbered or labelled slide outlines
//! - [`extract_html_fragment`]: one HTML slide out of a chatty reply
//! - [`research`]: deep-research completion and stage detection
//!
//! Only structure extraction can fail; everything else degrades to a default.

mod cleanup;
mod fragment;
mod plan_list;
pub mod research;
mod structure;

pub use cleanup::{clean_markdown_fence, strip_xml_fence, wrap_in_markdown_fence};
pub use fragment::{Fragment, FragmentSource, extract_html_fragment, has_own_styling};
pub use plan_list::{PlanEntry, PlanList, PlanSource, default_plan, extract_plan_list};
pub use research::{
    FORCED_CONCLUSION, ResearchStage, StageKind, first_paragraph_summary, is_research_complete,
};
pub use structure::extract_structure;
