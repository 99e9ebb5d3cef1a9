pub mod front_matter;
pub mod loaders;
pub mod parts;
pub mod task;

pub use front_matter::{FrontMatter, FrontMatterPatch};
pub use loaders::{load_config_file, ConfigFile};
pub use parts::{expand_section_ids, parse_section_arg, PART_SECTIONS};
pub use task::{Operation, StatusCounts, Task, TaskStatus};
