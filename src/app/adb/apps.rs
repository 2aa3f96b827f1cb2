use crate::app::models::PackageEntry;

/// Parses `pm list packages` output in both the plain (`package:NAME`) and
/// the `-f` (`package:PATH=NAME`) forms.
pub fn parse_pm_list_packages_output(output: &str) -> Vec<PackageEntry> {
    let mut apps = Vec::new();
    for raw in output.lines() {
        let line = raw.trim();
        let Some(payload) = line.strip_prefix("package:") else {
            continue;
        };
        let payload = payload.trim();
        if payload.is_empty() {
            continue;
        }
        match payload.rsplit_once('=') {
            Some((apk_path, pkg)) => {
                let pkg = pkg.trim();
                if pkg.is_empty() {
                    continue;
                }
                let apk_path = apk_path.trim().to_string();
                apps.push(PackageEntry {
                    package_name: pkg.to_string(),
                    is_system: is_system_path(&apk_path),
                    apk_path: Some(apk_path),
                });
            }
            None => apps.push(PackageEntry {
                package_name: payload.to_string(),
                apk_path: None,
                is_system: false,
            }),
        }
    }
    apps
}

/// True when the listing names `package_name` exactly; `com.termux.api`
/// does not satisfy `com.termux`.
pub fn listing_contains_package(output: &str, package_name: &str) -> bool {
    let wanted = package_name.trim();
    !wanted.is_empty()
        && parse_pm_list_packages_output(output)
            .iter()
            .any(|entry| entry.package_name == wanted)
}

fn is_system_path(path: &str) -> bool {
    path.starts_with("/system/")
        || path.starts_with("/product/")
        || path.starts_with("/vendor/")
        || path.starts_with("/system_ext/")
}
