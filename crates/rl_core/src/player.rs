//! 玩家实体定义

use std::fmt;

use serde::{Deserialize, Serialize};

/// 玩家 ID，从 1 开始编号，会话内唯一
pub type PlayerId = u32;

/// 玩家
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// 玩家 ID
    pub id: PlayerId,
    /// 参考图像 (编码后的原始字节，用于身份归属)
    #[serde(skip)]
    pub reference_image: Option<Vec<u8>>,
}

impl Player {
    /// 创建没有参考图像的玩家
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            reference_image: None,
        }
    }

    /// 附带参考图像
    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.reference_image = Some(image);
        self
    }

    /// 按注册列表顺序分配 ID (1-indexed)
    pub fn roster(images: Vec<Vec<u8>>) -> Vec<Player> {
        images
            .into_iter()
            .zip(1..)
            .map(|(image, id)| Player::new(id).with_image(image))
            .collect()
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field(
                "reference_image",
                &self.reference_image.as_ref().map(|img| img.len()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_is_one_indexed_in_list_order() {
        let players = Player::roster(vec![vec![1], vec![2, 2], vec![3, 3, 3]]);

        let ids: Vec<_> = players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(players[1].reference_image.as_deref(), Some(&[2u8, 2][..]));
    }

    #[test]
    fn test_debug_hides_image_bytes() {
        let player = Player::new(7).with_image(vec![0; 1024]);
        let rendered = format!("{:?}", player);
        assert!(rendered.contains("1024"));
        assert!(!rendered.contains("0, 0"));
    }
}
