use std::{env, path::PathBuf};

/// Points Windows builds at a vcpkg FFmpeg install when `FFMPEG_DIR` is
/// missing. Other targets rely on pkg-config through `ffmpeg-sys-next`.
fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() != "windows"
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!(
            "cargo:warning=reelcut needs FFmpeg development libraries; on Windows install them with vcpkg and set FFMPEG_DIR."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let installed = PathBuf::from(vcpkg_root).join("installed").join(triplet);

    if !installed.exists() {
        println!(
            "cargo:warning=VCPKG_ROOT is set but {} does not exist.",
            installed.display()
        );
        return;
    }

    println!(
        "cargo:warning=Found vcpkg FFmpeg at {0}; set FFMPEG_DIR={0} to use it explicitly.",
        installed.display()
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=Set VCPKGRS_DYNAMIC=1 for dynamic vcpkg FFmpeg builds.");
    }
}
