use anyhow::Result;
use chrono::Utc;
use native_db::*;
use once_cell::sync::Lazy;

use crate::models::*;

static MODELS: Lazy<Models> = Lazy::new(|| {
    let mut models = Models::new();
    models.define::<Platform>().unwrap();
    models.define::<Package>().unwrap();
    models
});

/// Package Store as consumed by the metadata fetcher and the HTTP handlers.
pub trait PackageStore: Send + Sync {
    fn get_package(&self, platform_id: &str, id: &str) -> Result<Option<Package>>;
    fn insert_package(&self, package: Package) -> Result<Package>;
    fn update_package(&self, package: Package) -> Result<()>;
    fn get_packages_by_platform(&self, platform_id: &str) -> Result<Vec<Package>>;
    fn remove_package(&self, platform_id: &str, id: &str) -> Result<bool>;
}

/// Platform Store. `get_all_platforms` returns platforms ordered by name.
pub trait PlatformStore: Send + Sync {
    fn get_all_platforms(&self) -> Result<Vec<Platform>>;
    fn get_platform(&self, id: &str) -> Result<Option<Platform>>;
    fn insert_platform(&self, platform: Platform) -> Result<Platform>;
    fn update_platform(&self, id: &str, changes: UpdatePlatformRequest) -> Result<Option<Platform>>;
    fn delete_platform(&self, id: &str) -> Result<bool>;

    fn platform_exists(&self, id: &str) -> Result<bool> {
        Ok(self.get_platform(id)?.is_some())
    }
}

/// Both stores behind one handle.
pub trait CatalogStore: PackageStore + PlatformStore {}

impl<T: PackageStore + PlatformStore> CatalogStore for T {}

pub struct Database {
    db: native_db::Database<'static>,
}

impl Database {
    pub fn new(path: &str) -> Result<Self> {
        let db = Builder::new().create(&MODELS, path)?;
        Ok(Self { db })
    }

    pub fn in_memory() -> Result<Self> {
        let db = Builder::new().create_in_memory(&MODELS)?;
        Ok(Self { db })
    }

    pub fn get_all_packages(&self) -> Result<Vec<Package>> {
        let r = self.db.r_transaction()?;
        let all: Vec<Package> = r.scan().primary()?.all()?.collect::<Result<Vec<_>, _>>()?;
        Ok(all)
    }

    /// Inserts the default platforms when the store holds none.
    pub fn seed_default_platforms(&self) -> Result<usize> {
        if !self.get_all_platforms()?.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut seeded = 0;
        for (id, name, package_manager, icon) in DEFAULT_PLATFORMS {
            self.insert_platform(Platform {
                id: id.to_string(),
                name: name.to_string(),
                package_manager: package_manager.to_string(),
                icon: Some(icon.to_string()),
                created_at: now,
                updated_at: now,
            })?;
            seeded += 1;
        }
        Ok(seeded)
    }
}

const DEFAULT_PLATFORMS: [(&str, &str, &str, &str); 5] = [
    ("ubuntu", "Ubuntu", "apt", "icons/ubuntu.svg"),
    ("fedora", "Fedora", "dnf", "icons/fedora.svg"),
    ("arch", "Arch Linux", "pacman", "icons/arch.svg"),
    ("windows", "Windows", "winget", "icons/windows.svg"),
    ("macos", "macOS", "brew", "icons/macos.svg"),
];

impl PackageStore for Database {
    fn get_package(&self, platform_id: &str, id: &str) -> Result<Option<Package>> {
        let r = self.db.r_transaction()?;
        Ok(r.get().primary(package_key(platform_id, id))?)
    }

    fn insert_package(&self, package: Package) -> Result<Package> {
        let rw = self.db.rw_transaction()?;
        rw.insert(package.clone())?;
        rw.commit()?;
        Ok(package)
    }

    fn update_package(&self, package: Package) -> Result<()> {
        let rw = self.db.rw_transaction()?;
        // native_db doesn't have direct update, must remove and insert
        if let Some(old) = rw.get().primary::<Package>(package.scoped_key())? {
            rw.remove(old)?;
        }
        rw.insert(package)?;
        rw.commit()?;
        Ok(())
    }

    fn get_packages_by_platform(&self, platform_id: &str) -> Result<Vec<Package>> {
        let r = self.db.r_transaction()?;
        let packages: Vec<Package> = r
            .scan()
            .primary()?
            .start_with(format!("{}/", platform_id))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(packages)
    }

    fn remove_package(&self, platform_id: &str, id: &str) -> Result<bool> {
        let rw = self.db.rw_transaction()?;
        let removed = match rw.get().primary::<Package>(package_key(platform_id, id))? {
            Some(old) => {
                rw.remove(old)?;
                true
            }
            None => false,
        };
        rw.commit()?;
        Ok(removed)
    }
}

impl PlatformStore for Database {
    fn get_all_platforms(&self) -> Result<Vec<Platform>> {
        let r = self.db.r_transaction()?;
        let mut all: Vec<Platform> = r.scan().primary()?.all()?.collect::<Result<Vec<_>, _>>()?;
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    fn get_platform(&self, id: &str) -> Result<Option<Platform>> {
        let r = self.db.r_transaction()?;
        Ok(r.get().primary(id.to_string())?)
    }

    fn insert_platform(&self, platform: Platform) -> Result<Platform> {
        let rw = self.db.rw_transaction()?;
        rw.insert(platform.clone())?;
        rw.commit()?;
        Ok(platform)
    }

    fn update_platform(&self, id: &str, changes: UpdatePlatformRequest) -> Result<Option<Platform>> {
        let rw = self.db.rw_transaction()?;
        let Some(old) = rw.get().primary::<Platform>(id.to_string())? else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(old));
        }

        let mut platform = old.clone();
        if let Some(name) = changes.name {
            platform.name = name;
        }
        if let Some(package_manager) = changes.package_manager {
            platform.package_manager = package_manager;
        }
        if let Some(icon) = changes.icon {
            platform.icon = Some(icon);
        }
        platform.updated_at = Utc::now();

        rw.remove(old)?;
        rw.insert(platform.clone())?;
        rw.commit()?;
        Ok(Some(platform))
    }

    fn delete_platform(&self, id: &str) -> Result<bool> {
        let rw = self.db.rw_transaction()?;
        let removed = match rw.get().primary::<Platform>(id.to_string())? {
            Some(old) => {
                rw.remove(old)?;
                true
            }
            None => false,
        };
        rw.commit()?;
        Ok(removed)
    }
}
