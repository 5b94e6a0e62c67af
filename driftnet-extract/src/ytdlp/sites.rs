//! Long-tail sites served through yt-dlp.

/// A site name and the hosts it answers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub name: &'static str,
    pub hosts: &'static [&'static str],
}

pub const SITES: &[Site] = &[
    Site {
        name: "tiktok",
        hosts: &["tiktok.com", "vm.tiktok.com", "vt.tiktok.com"],
    },
    Site {
        name: "twitter",
        hosts: &["twitter.com", "x.com", "mobile.twitter.com"],
    },
    Site {
        name: "facebook",
        hosts: &["facebook.com", "fb.watch", "fb.com"],
    },
    Site {
        name: "vimeo",
        hosts: &["vimeo.com", "player.vimeo.com"],
    },
    Site {
        name: "reddit",
        hosts: &["reddit.com", "old.reddit.com", "redd.it"],
    },
    Site {
        name: "pinterest",
        hosts: &["pinterest.com", "pin.it"],
    },
    Site {
        name: "tumblr",
        hosts: &["tumblr.com"],
    },
    Site {
        name: "bilibili",
        hosts: &["bilibili.com", "b23.tv"],
    },
    Site {
        name: "douyin",
        hosts: &["douyin.com", "iesdouyin.com"],
    },
    Site {
        name: "weibo",
        hosts: &["weibo.com", "weibo.cn"],
    },
    Site {
        name: "xiaohongshu",
        hosts: &["xiaohongshu.com", "xhslink.com"],
    },
    Site {
        name: "vk",
        hosts: &["vk.com", "vkvideo.ru"],
    },
    Site {
        name: "rumble",
        hosts: &["rumble.com"],
    },
    Site {
        name: "iqiyi",
        hosts: &["iqiyi.com"],
    },
    Site {
        name: "youku",
        hosts: &["youku.com"],
    },
    Site {
        name: "kuaishou",
        hosts: &["kuaishou.com"],
    },
    Site {
        name: "ixigua",
        hosts: &["ixigua.com"],
    },
    Site {
        name: "douyu",
        hosts: &["douyu.com"],
    },
    Site {
        name: "huya",
        hosts: &["huya.com"],
    },
    Site {
        name: "mgtv",
        hosts: &["mgtv.com"],
    },
    Site {
        name: "qq",
        hosts: &["qq.com", "v.qq.com"],
    },
    Site {
        name: "netease",
        hosts: &["163.com", "music.163.com"],
    },
    Site {
        name: "zhihu",
        hosts: &["zhihu.com"],
    },
    Site {
        name: "acfun",
        hosts: &["acfun.cn"],
    },
    Site {
        name: "haokan",
        hosts: &["haokan.baidu.com"],
    },
    Site {
        name: "ximalaya",
        hosts: &["ximalaya.com"],
    },
    Site {
        name: "xinpianchang",
        hosts: &["xinpianchang.com"],
    },
    Site {
        name: "zingmp3",
        hosts: &["zingmp3.vn"],
    },
];

/// Site entry by name.
pub fn site(name: &str) -> Option<&'static Site> {
    SITES.iter().find(|site| site.name == name)
}
