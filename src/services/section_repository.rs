//! 小节仓库 - 业务能力层
//!
//! 只负责"找到小节文件、读写 front matter、定位 skill 资源"，不关心流程

use crate::error::{AppError, AppResult, SectionError};
use crate::models::front_matter::{self, FrontMatter, FrontMatterPatch};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// 书籍目录的读写入口
///
/// 职责：
/// - 按节号定位小节 Markdown 文件
/// - 解析、合并并写回 front matter，正文原样保留
/// - 提供 skill 目录下 references / assets 的路径
#[derive(Debug, Clone)]
pub struct SectionRepository {
    book_dir: PathBuf,
    skill_root: PathBuf,
}

impl SectionRepository {
    pub fn new(book_dir: impl Into<PathBuf>, skill_dir: impl AsRef<Path>) -> Self {
        let book_dir = book_dir.into();
        let skill_root = book_dir.join(skill_dir);
        Self {
            book_dir,
            skill_root,
        }
    }

    pub fn book_dir(&self) -> &Path {
        &self.book_dir
    }

    /// `references/<name>`
    pub fn reference_file(&self, name: &str) -> PathBuf {
        self.skill_root.join("references").join(name)
    }

    /// `assets/<kind>/`
    pub fn assets_dir(&self, kind: &str) -> PathBuf {
        self.skill_root.join("assets").join(kind)
    }

    /// 按节号查找小节文件
    ///
    /// 依次扫描书籍目录下的各章节目录（按名称排序，跳过隐藏目录），
    /// 返回第一个文件名为 `<节号>.md` 或以 `<节号>_` 开头的 Markdown 文件
    pub async fn find(&self, section_id: &str) -> AppResult<Option<PathBuf>> {
        for chapter_dir in self.chapter_dirs().await? {
            for md_file in markdown_files(&chapter_dir).await? {
                if file_matches_section(&md_file, section_id) {
                    debug!("小节 {} → {}", section_id, md_file.display());
                    return Ok(Some(md_file));
                }
            }
        }
        Ok(None)
    }

    /// 查找小节文件，找不到时报错
    pub async fn require(&self, section_id: &str) -> AppResult<PathBuf> {
        self.find(section_id)
            .await?
            .ok_or_else(|| AppError::section_not_found(section_id))
    }

    /// 所有章节目录（已排序）
    pub async fn chapter_dirs(&self) -> AppResult<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let mut entries = fs::read_dir(&self.book_dir)
            .await
            .map_err(|e| AppError::file_read_failed(self.book_dir.display().to_string(), e))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if !hidden && entry.file_type().await?.is_dir() {
                dirs.push(path);
            }
        }

        dirs.sort();
        Ok(dirs)
    }

    /// 读取文件内容
    pub async fn read(&self, path: &Path) -> AppResult<String> {
        fs::read_to_string(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))
    }

    /// 写入文件，必要时创建父目录
    pub async fn write(&self, path: &Path, content: &str) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::file_write_failed(parent.display().to_string(), e))?;
        }
        fs::write(path, content)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))
    }

    /// 读取 front matter，文件没有 front matter 时返回 `None`
    pub async fn read_front_matter(&self, path: &Path) -> AppResult<Option<FrontMatter>> {
        let content = self.read(path).await?;
        let parsed = front_matter::parse(&content).map_err(|source| SectionError::FrontMatter {
            path: path.display().to_string(),
            source,
        })?;
        Ok(parsed.map(|(front, _)| front))
    }

    /// 合并修改到小节文件的 front matter
    ///
    /// 文件没有 front matter 时不做修改并返回 `false`
    pub async fn patch(&self, path: &Path, patch: &FrontMatterPatch) -> AppResult<bool> {
        let content = self.read(path).await?;
        let Some((mut front, body)) =
            front_matter::parse(&content).map_err(|source| SectionError::FrontMatter {
                path: path.display().to_string(),
                source,
            })?
        else {
            debug!("{} 没有 front matter，跳过更新", path.display());
            return Ok(false);
        };

        front.merge(patch);
        let rendered = render(path, &front, body)?;
        self.write(path, &rendered).await?;
        Ok(true)
    }

    /// 替换正文并合并 front matter；文件原本没有 front matter 时使用 `fallback`
    pub async fn replace_body(
        &self,
        path: &Path,
        body: &str,
        patch: &FrontMatterPatch,
        fallback: FrontMatter,
    ) -> AppResult<()> {
        let content = self.read(path).await?;
        let existing = front_matter::parse(&content).map_err(|source| SectionError::FrontMatter {
            path: path.display().to_string(),
            source,
        })?;

        let mut front = existing.map(|(front, _)| front).unwrap_or(fallback);
        front.merge(patch);
        let rendered = render(path, &front, body)?;
        self.write(path, &rendered).await
    }
}

fn render(path: &Path, front: &FrontMatter, body: &str) -> AppResult<String> {
    front_matter::render(front, body).map_err(|source| {
        SectionError::FrontMatter {
            path: path.display().to_string(),
            source,
        }
        .into()
    })
}

fn file_matches_section(path: &Path, section_id: &str) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some(stem) = name.strip_suffix(".md") else {
        return false;
    };
    stem == section_id || stem.starts_with(&format!("{}_", section_id))
}

async fn markdown_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("md") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn book_with_sections() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let chapter = dir.path().join("第一部分");
        fs::create_dir_all(&chapter).await.unwrap();
        fs::write(
            chapter.join("1.1_为什么需要智能体.md"),
            "---\nsection_id: \"1.1\"\ntitle: 为什么需要智能体\nstatus: outline\nword_count: 0\ntarget_words: 3000\nreviewer: 李四\n---\n\n# 为什么需要智能体\n",
        )
        .await
        .unwrap();
        fs::write(chapter.join("1.10_附录.md"), "---\nstatus: outline\n---\n")
            .await
            .unwrap();
        fs::create_dir_all(dir.path().join(".claude")).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn test_find_does_not_confuse_prefix_ids() {
        let dir = book_with_sections().await;
        let repo = SectionRepository::new(dir.path(), ".claude/skills/book-writer");

        let found = repo.find("1.1").await.unwrap().unwrap();
        assert!(found.ends_with("1.1_为什么需要智能体.md"));

        let found = repo.find("1.10").await.unwrap().unwrap();
        assert!(found.ends_with("1.10_附录.md"));

        assert!(repo.find("2.1").await.unwrap().is_none());
        assert!(matches!(
            repo.require("2.1").await.unwrap_err(),
            AppError::Section(SectionError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_patch_preserves_unknown_keys_and_body() {
        let dir = book_with_sections().await;
        let repo = SectionRepository::new(dir.path(), ".claude/skills/book-writer");
        let path = repo.require("1.1").await.unwrap();

        let patched = repo
            .patch(&path, &FrontMatterPatch::status("researched"))
            .await
            .unwrap();
        assert!(patched);

        let front = repo.read_front_matter(&path).await.unwrap().unwrap();
        assert_eq!(front.status.as_deref(), Some("researched"));
        assert_eq!(front.section_id.as_deref(), Some("1.1"));
        assert_eq!(
            front.extra.get("reviewer").and_then(|v| v.as_str()),
            Some("李四")
        );

        let content = repo.read(&path).await.unwrap();
        assert!(content.ends_with("---\n\n# 为什么需要智能体\n"));
    }

    #[tokio::test]
    async fn test_patch_without_front_matter_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.md");
        fs::write(&path, "# 没有元数据\n").await.unwrap();

        let repo = SectionRepository::new(dir.path(), ".claude/skills/book-writer");
        assert!(!repo.patch(&path, &FrontMatterPatch::status("final")).await.unwrap());
        assert_eq!(repo.read(&path).await.unwrap(), "# 没有元数据\n");
    }
}
